//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Course authoring REST backend with OIDC bearer authentication
#[derive(Parser, Debug)]
#[command(name = "course-api")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "COURSE_API_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "COURSE_API_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "COURSE_API_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "COURSE_API_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "COURSE_API_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the API server (default)
    Serve,

    /// Fetch the identity provider's JWKS and list the signing key IDs
    Keys,

    /// Validate a bearer token against the live JWKS and print its claims
    Validate {
        /// The token (without the `Bearer ` prefix)
        #[arg(required = true)]
        token: String,

        /// Also ask the provider whether the token is still active
        #[arg(long)]
        introspect: bool,
    },

    /// Print the effective configuration as YAML
    Config,

    /// Generate shell completions
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}
