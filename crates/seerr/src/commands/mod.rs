//! Subcommand handlers.

pub mod apply;
pub mod dump_config;
