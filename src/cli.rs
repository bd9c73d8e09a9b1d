//! CLI command definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// cdevents-provider - CDEvent notification when managed resources become ready
#[derive(Parser, Debug)]
#[command(name = "cdevents-provider")]
#[command(version)]
#[command(about = "Emits one CDEvent the first time a managed resource reports Ready")]
pub struct Cli {
    /// Config file (TOML, or JSON with a .json extension)
    #[arg(long, global = true, env = "CDP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Observe resource documents once, sending events that are owed
    Observe {
        /// Kubernetes-shaped JSON resource documents
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List the markers recorded in the registry
    Markers,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}
