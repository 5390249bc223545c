use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Discover, provision and run sandboxed tools.
///
/// `toolhost <tool>` reads one JSON document from stdin and prints the
/// tool's JSON result on stdout.
#[derive(Debug, Parser)]
#[command(name = "toolhost", version, arg_required_else_help = true)]
pub struct Cli {
    /// Runtime root holding tools/, sandboxes/ and storage/ (default ~/.toolhost)
    #[arg(long, global = true, env = "TOOLHOST_ROOT")]
    pub root: Option<PathBuf>,

    /// Log filter, e.g. info, debug, toolhost_core=trace
    #[arg(long = "log-level", global = true, env = "TOOLHOST_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print every discovered tool and its declarations as JSON
    List,

    /// Reclaim orphaned directories and provision every tool with dependencies
    Update,

    /// Run a tool by name
    #[command(external_subcommand)]
    Run(Vec<String>),
}

impl Command {
    /// Tool name and any trailing arguments of a `Run`.
    pub fn tool(&self) -> Option<(&str, &[String])> {
        match self {
            Command::Run(args) => args.split_first().map(|(name, rest)| (name.as_str(), rest)),
            _ => None,
        }
    }
}
