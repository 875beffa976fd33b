//! CLI subcommand implementations.

pub mod analyze;
pub mod config_cmd;
pub mod donate;
pub mod projects;
pub mod recommend;
pub mod stats;
pub mod unknowns;
pub mod util;
