//! Integration test suite for docdeps
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **pool_scenarios**: multi-"process" slot pool behavior (each pool
//!   instance owns its own lock table, so separate instances contend
//!   through the OS exactly like separate processes)
//! - **git_restore**: restoring real checkouts from a local repository
//! - **cli**: the `docdeps` binary end to end

mod cli;
mod git_restore;
mod pool_scenarios;
