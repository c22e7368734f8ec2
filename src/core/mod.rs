//! Core types shared across docdeps.
//!
//! Currently this is the error taxonomy and the user-facing error
//! rendering used by the CLI.

pub mod error;

pub use error::{DocdepsError, ErrorContext, user_friendly_error};
