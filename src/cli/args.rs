//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <path>`: Use this config file instead of the default search
//! - `--storage-dir <path>`: Override the storage directory
//! - `--debug`: Enable debug logging

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::core::config::FileConfig;
use crate::persist::RecoveryPolicy;

/// Guestbook - sign in, see who else did, never lose the list
#[derive(Parser, Debug)]
#[command(name = "guestbook")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file to load
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding durable images
    #[arg(long, global = true, value_name = "DIR")]
    pub storage_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }

    /// Config values given on the command line.
    pub fn overrides(&self) -> FileConfig {
        let mut overrides = FileConfig {
            storage_dir: self.storage_dir.clone(),
            ..Default::default()
        };
        match &self.command {
            Command::Serve {
                listen,
                flush_interval,
                recovery,
            } => {
                overrides.listen = listen.clone();
                overrides.flush_interval_secs = *flush_interval;
                overrides.recovery = recovery.map(Into::into);
            }
            Command::Show { recovery } => {
                overrides.recovery = recovery.map(Into::into);
            }
            Command::Images => {}
        }
        overrides
    }
}

/// What to do when the newest image is corrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecoveryArg {
    /// Refuse to start
    Strict,
    /// Use the next-older complete image
    Fallback,
}

impl From<RecoveryArg> for RecoveryPolicy {
    fn from(arg: RecoveryArg) -> Self {
        match arg {
            RecoveryArg::Strict => RecoveryPolicy::Strict,
            RecoveryArg::Fallback => RecoveryPolicy::Fallback,
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the guestbook HTTP service
    #[command(
        long_about = "Run the guestbook HTTP service.\n\n\
            Loads the newest complete image from the storage directory, serves \
            GET / and POST /sign, and flushes the guest list to a new image on \
            every interval. Ctrl-C stops the server and performs one final flush.",
        after_help = "\
EXAMPLES:
    guestbook serve --listen 0.0.0.0:8089
    curl -d 'name=alice&special=true' http://127.0.0.1:8089/sign
    curl http://127.0.0.1:8089/"
    )]
    Serve {
        /// Address to listen on
        #[arg(long, value_name = "ADDR")]
        listen: Option<String>,

        /// Seconds between background flushes
        #[arg(long, value_name = "SECS")]
        flush_interval: Option<u64>,

        /// Policy when the newest image is corrupt
        #[arg(long, value_enum)]
        recovery: Option<RecoveryArg>,
    },

    /// Print the guest list from the newest complete image
    Show {
        /// Policy when the newest image is corrupt
        #[arg(long, value_enum)]
        recovery: Option<RecoveryArg>,
    },

    /// List image files in the storage directory, newest first
    Images,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_flags_become_overrides() {
        let cli = Cli::parse_from([
            "guestbook",
            "--storage-dir",
            "/tmp/g",
            "serve",
            "--listen",
            "127.0.0.1:9000",
            "--flush-interval",
            "5",
            "--recovery",
            "fallback",
        ]);
        let overrides = cli.overrides();

        assert_eq!(overrides.storage_dir, Some(PathBuf::from("/tmp/g")));
        assert_eq!(overrides.listen.as_deref(), Some("127.0.0.1:9000"));
        assert_eq!(overrides.flush_interval_secs, Some(5));
        assert_eq!(overrides.recovery, Some(RecoveryPolicy::Fallback));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["guestbook", "images", "--debug", "--storage-dir", "x"]);
        assert!(cli.debug);
        assert_eq!(cli.overrides().storage_dir, Some(PathBuf::from("x")));
    }
}
