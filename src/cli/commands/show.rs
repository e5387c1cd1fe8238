//! show command - Print the guest list from the newest complete image

use anyhow::{Context as _, Result};

use super::Context;
use crate::persist::ImageReader;
use crate::server::render;

/// Print the durable guest list, sorted by name.
///
/// Visits are not persisted, so the count shown is always 0.
pub fn show(ctx: &Context) -> Result<()> {
    let storage_dir = ctx.config.storage_dir();
    let snapshot = ImageReader::new(&storage_dir)
        .with_recovery(ctx.config.recovery())
        .load_latest()
        .with_context(|| format!("failed to load guests from {}", storage_dir.display()))?;

    print!("{}", render::render_guests(0, &snapshot.sorted_entries()));
    Ok(())
}
