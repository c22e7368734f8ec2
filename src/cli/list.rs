//! `docdeps list`: show the slot registry of a remote.

use crate::cache::{GitSlotPool, GitVersion, SlotRecord};
use crate::cli::common::short_commit;
use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;

/// Output format for `docdeps list`.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Show the slots recorded for a remote.
#[derive(Args, Debug)]
pub struct ListCommand {
    /// Remote repository URL
    pub url: String,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

impl ListCommand {
    pub async fn execute(self, pool: &GitSlotPool) -> Result<()> {
        let slots = pool.slots(&self.url).await?;

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&slots)?),
            OutputFormat::Table if slots.is_empty() => {
                println!("No slots recorded for {}", self.url);
            }
            OutputFormat::Table => print!("{}", render_table(&slots)),
        }
        Ok(())
    }
}

fn state(slot: &SlotRecord<GitVersion>) -> &'static str {
    if slot.restored {
        "restored"
    } else if slot.acquirer.is_some() {
        "restoring"
    } else {
        "empty"
    }
}

fn render_table(slots: &[SlotRecord<GitVersion>]) -> String {
    let branch_width = slots.iter().map(|s| s.version.branch.len()).max().unwrap_or(0).max(6);
    let mut out = format!(
        "{:<4} {:<branch_width$} {:<12} {:<9} {}\n",
        "ID", "BRANCH", "COMMIT", "STATE", "LAST ACCESS"
    )
    .bold()
    .to_string();

    for slot in slots {
        let label = match state(slot) {
            "restored" => "restored".green(),
            "restoring" => "restoring".yellow(),
            other => other.dimmed(),
        };
        out.push_str(&format!(
            "{:<4} {:<branch_width$} {:<12} {:<9} {}\n",
            slot.id,
            slot.version.branch,
            short_commit(&slot.version.commit),
            label,
            slot.last_access_date.format("%Y-%m-%d %H:%M:%S UTC"),
        ));
    }
    out
}
