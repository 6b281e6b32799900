//! CLI module for cvault
//!
//! Command-line parsing for the cvault-server binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// cvault - credential and session authority for the CV vault backend
#[derive(Parser, Debug)]
#[command(
    name = "cvault-server",
    version,
    about = "cvault - credential and session authority",
    long_about = "Issues and checks passwords, one-time confirmation codes and session tokens,\n\
                  and guards every API route with an authentication and a role gate.\n\n\
                  Run without arguments to start the server.",
    after_help = "EXAMPLES:\n    \
                  cvault-server                              # Start the server (reads cvault.toml)\n    \
                  cvault-server --config prod.toml serve     # Use a custom config file\n    \
                  cvault-server config --validate            # Check configuration and exit\n    \
                  cvault-server hash-password 's3cret-pass'  # Print an Argon2id record"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "cvault.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute (defaults to `serve`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the HTTP server
    Serve,

    /// Show configuration information
    Config {
        /// Print the resolved configuration (secrets are never printed)
        #[arg(short = 'f', long)]
        full: bool,

        /// Validate the configuration file and referenced env vars
        #[arg(long)]
        validate: bool,
    },

    /// Hash a password with the configured Argon2id parameters
    ///
    /// Useful for seeding accounts into an external user store.
    HashPassword {
        /// The plaintext password
        password: String,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The subcommand to run, `serve` when none was given
    pub fn command(&self) -> &Commands {
        self.command.as_ref().unwrap_or(&Commands::Serve)
    }
}
