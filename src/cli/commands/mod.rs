//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Reads what it needs from the resolved [`Context`]
//! 2. Calls into `service`, `persist` or `server`
//! 3. Formats and displays output
//!
//! `show` and `images` only read the storage directory and never take the
//! engine lock, so they work while a server is running.

mod images;
mod serve;
mod show;

pub use images::images;
pub use serve::serve;
pub use show::show;

use anyhow::Result;

use super::args::Command;
use crate::core::config::Config;

/// Everything a handler needs beyond its own arguments.
#[derive(Debug)]
pub struct Context {
    /// Defaults, config file and command-line flags, already merged.
    pub config: Config,
}

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Serve { .. } => serve::serve(ctx),
        Command::Show { .. } => show::show(ctx),
        Command::Images => images::images(ctx),
    }
}
