//! CLI argument parsing types.
//!
//! This module provides the command-line interface structure for the tin binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Explore and call a configured REST API.
#[derive(Parser, Debug)]
#[command(name = "tin", about = "Configuration-driven REST API CLI", version)]
pub struct Cli {
    /// API configuration file (YAML or JSON).
    #[arg(long, short, global = true, env = "TIN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Environment to select in a multi-environment configuration.
    #[arg(long, short, global = true, env = "TIN_ENV")]
    pub env: Option<String>,

    /// Output results as JSON instead of a table.
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the endpoint tree.
    Tree,

    /// List every method with its verb and path.
    Methods,

    /// Show the connection details and definition of a method.
    Describe {
        /// Dotted method path, e.g. `orgs.members.list`.
        endpoint: String,
    },

    /// Invoke a method.
    Call {
        /// Dotted method path, e.g. `users.get`.
        endpoint: String,

        /// Value of the `id` path token.
        id: Option<String>,

        /// Path token, as `name=value`. Repeatable.
        #[arg(long = "token", short = 't', value_parser = parse_key_value)]
        tokens: Vec<(String, String)>,

        /// Query parameter, as `name=value`. Repeatable.
        #[arg(long = "param", short = 'p', value_parser = parse_key_value)]
        params: Vec<(String, String)>,

        /// JSON request body.
        #[arg(long, short)]
        data: Option<String>,
    },
}

/// Parse a `name=value` argument.
pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got '{raw}'")),
    }
}
