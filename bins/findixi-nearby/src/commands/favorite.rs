//! Toggle a device-local favorite

use crate::Format;
use crate::wiring::local_favorites;
use anyhow::{Result, bail};
use findixi_core::config::ConfigSchema;
use owo_colors::OwoColorize;

/// Adds `id` to the local favorites, or removes it if present.
pub fn run(schema: &ConfigSchema, id: i64, format: Format) -> Result<()> {
    if id <= 0 {
        bail!("Record ids are positive, got {id}");
    }

    let store = local_favorites(schema);
    let now_favorite = store.toggle(id)?;
    let mut ids = store.load();
    ids.sort_unstable();

    match format {
        Format::Json => {
            let out = serde_json::json!({ "id": id, "favorite": now_favorite, "favorites": ids });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Text if now_favorite => println!("{} {} added to favorites", "★".yellow(), id),
        Format::Text => println!("{} {} removed from favorites", "☆".dimmed(), id),
    }
    Ok(())
}
