// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `scriptrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "scriptrun",
    version,
    about = "Run setup scripts, dev servers and hooks as managed processes.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML). A missing file means defaults.
    #[arg(long, value_name = "PATH", default_value = "Scriptrun.toml")]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SCRIPTRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CliCommand {
    /// Run commands one by one, stopping at the first failure.
    Run(KeyedRunArgs),
    /// Start commands as one long-lived process; Ctrl-C stops it.
    Serve(KeyedRunArgs),
    /// Run commands with buffered output and a per-command timeout.
    Hook(HookArgs),
    /// Print the commands that would run, without running anything.
    Parse(ScriptArgs),
}

/// Script sources shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct ScriptArgs {
    /// Read script text from a file (repeatable, appended in order).
    #[arg(long = "file", value_name = "PATH")]
    pub files: Vec<PathBuf>,

    /// Script text; may contain several lines.
    #[arg(value_name = "SCRIPT")]
    pub scripts: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct KeyedRunArgs {
    /// Execution key; at most one process runs per key.
    #[arg(long, default_value = "default")]
    pub key: String,

    /// Working directory for every command.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub cwd: PathBuf,

    /// Extra environment variable (repeatable), overriding config `[env]`.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Print events as JSON lines instead of plain output.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub script: ScriptArgs,
}

#[derive(Debug, Clone, Args)]
pub struct HookArgs {
    /// Working directory for every command.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub cwd: PathBuf,

    /// Per-command timeout; defaults to `[capture].timeout_ms`.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    #[command(flatten)]
    pub script: ScriptArgs,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
