//! Arguments shared by the slot commands.

use clap::Args;

/// Remote, branch and optional commit of a checkout.
#[derive(Args, Debug, Clone)]
pub struct RemoteArgs {
    /// Remote repository URL
    pub url: String,

    /// Branch to restore or build from
    #[arg(short, long)]
    pub branch: String,

    /// Exact commit; restore resolves the branch head when omitted, build
    /// takes the most recently used restored checkout of the branch
    #[arg(long)]
    pub commit: Option<String>,
}

/// First 12 characters of a commit id.
pub(crate) fn short_commit(commit: &str) -> &str {
    commit.get(..12).unwrap_or(commit)
}
