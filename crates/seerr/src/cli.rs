//! Clap derive structures for the `seerr` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// seerr -- declarative configuration for Jellyseerr-style request servers
#[derive(Debug, Parser)]
#[command(
    name = "seerr",
    version,
    about = "Reconcile a Jellyseerr instance against a declarative YAML document",
    long_about = "Reads the desired settings of a Jellyseerr-style media request server from a\n\
        YAML document, compares them with the live instance and pushes only what differs.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Request timeout in seconds (overrides the config file)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Bring the remote instance in line with the config document
    Apply(ApplyArgs),

    /// Read every managed section from a remote instance and print it as YAML
    DumpConfig(DumpConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Config document (defaults to the platform config directory)
    #[arg(long, short = 'c', env = "SEERR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Compute and log changes without modifying the remote
    #[arg(long)]
    pub dry_run: bool,

    /// Report up-to-date attributes as well as changed ones
    #[arg(long)]
    pub check_unmanaged: bool,
}

#[derive(Debug, Args)]
pub struct DumpConfigArgs {
    /// Instance URL, e.g. http://localhost:5055
    pub url: String,

    /// API key of the instance (prompted for when absent)
    #[arg(long, env = "SEERR_API_KEY", hide_env = true)]
    pub api_key: Option<String>,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
