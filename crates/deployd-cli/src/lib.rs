//! deployd command-line interface
//!
//! `deployd run` starts the dispatcher from a configuration file and feeds it
//! line-delimited JSON events from stdin; `deployd check` validates a
//! configuration; `deployd registry` prints the event to action table.

pub mod commands;
pub mod error;
pub mod input;
pub mod logging;

pub use error::{CliError, CliResult};
