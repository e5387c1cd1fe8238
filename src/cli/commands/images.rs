//! images command - List image files in the storage directory

use anyhow::{Context as _, Result};

use super::Context;
use crate::persist::ImageReader;

/// Print one line per image, newest first: sequence, state, file name.
pub fn images(ctx: &Context) -> Result<()> {
    let storage_dir = ctx.config.storage_dir();
    let reader = ImageReader::new(&storage_dir);
    let images = reader
        .images()
        .with_context(|| format!("failed to list {}", storage_dir.display()))?;

    if images.is_empty() {
        println!("No images in {}", storage_dir.display());
        return Ok(());
    }

    for info in images {
        println!(
            "{:>20}  {:<8}  {}",
            info.id.seq(),
            info.state.to_string(),
            info.id.file_name(info.state)
        );
    }
    Ok(())
}
