//! CLI subcommands.

pub mod config;
pub mod platforms;
pub mod update;
