//! CLI subcommand implementations.

pub mod clear;
pub mod export;
pub mod list;
pub mod session;
pub mod status;
pub mod total;
pub mod util;
