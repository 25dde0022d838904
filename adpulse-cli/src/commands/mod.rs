//! Subcommand implementations.

pub mod campaigns;
pub mod completion;
pub mod config;
pub mod insights;
pub mod overview;
pub mod watch;
