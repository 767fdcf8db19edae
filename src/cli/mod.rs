//! CLI support for the `oplog-tail` binary.
//!
//! This module provides:
//! - Argument parsing ([`TailArgs`])
//! - Console formatting of operations ([`format_operation`])
//! - The reaction to consumer errors ([`error_action`])

pub mod args;
pub mod output;

pub use args::TailArgs;
pub use output::{error_action, format_operation, ErrorAction};
