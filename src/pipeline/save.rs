use super::layout::{safe_folder_name, SaveLayout};
use super::{PostProcessor, ProcessError, ProcessResult};
use crate::item::{Item, ItemKind};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const METADATA_FILE: &str = "metadata.json";

/// Writes an item's content and metadata to disk
///
/// Each item gets its own folder holding the content file (`page.html` for
/// HTML items, `image_<hash><ext>` for images) and `metadata.json`, which is
/// the item metadata plus the content file name.
#[derive(Debug, Clone)]
pub struct SaveProcessor {
    kind: ItemKind,
    layout: SaveLayout,
    site_dir: PathBuf,
}

impl SaveProcessor {
    pub fn new(kind: ItemKind, layout: SaveLayout, site_dir: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            layout,
            site_dir: site_dir.into(),
        }
    }

    /// Folder the item is written to
    pub fn save_path(&self, item: &Item) -> PathBuf {
        self.layout
            .destination(&self.site_dir, item)
            .join(safe_folder_name(item.id()))
    }

    /// Name of the content file inside the item folder
    pub fn content_filename(&self, item: &Item) -> String {
        match item.kind() {
            ItemKind::Image => {
                let digest = hex::encode(Sha256::digest(item.url().as_bytes()));
                let mime = item
                    .header("content-type")
                    .and_then(|value| value.split(';').next())
                    .map(|mime| mime.trim().to_ascii_lowercase())
                    .unwrap_or_default();
                format!("image_{}{}", &digest[..8], extension_for(&mime))
            }
            _ => "page.html".to_string(),
        }
    }

    fn write(&self, folder: &Path, item: &Item) -> ProcessResult<()> {
        fs::create_dir_all(folder)?;

        let filename = self.content_filename(item);
        fs::write(folder.join(&filename), item.content())?;

        let mut metadata = serde_json::Map::new();
        metadata.insert("filename".to_string(), Value::from(filename));
        metadata.extend(item.metadata().clone());
        fs::write(
            folder.join(METADATA_FILE),
            serde_json::to_string_pretty(&Value::Object(metadata))?,
        )?;

        Ok(())
    }
}

impl PostProcessor for SaveProcessor {
    fn name(&self) -> &str {
        match self.kind {
            ItemKind::Image => "save:image",
            ItemKind::Html => "save:html",
            ItemKind::Generic => "save:generic",
        }
    }

    fn process(&self, item: &Item) -> ProcessResult<Option<Item>> {
        if item.kind() != self.kind {
            return Err(ProcessError::UnsupportedKind {
                processor: self.name().to_string(),
                kind: item.kind(),
            });
        }

        let folder = self.save_path(item);
        self.write(&folder, item)?;
        debug!("Saved {} item {} to {}", item.kind(), item.id(), folder.display());
        Ok(None)
    }

    fn already_processed(&self, item: &Item) -> bool {
        self.save_path(item).join(METADATA_FILE).exists()
    }
}

/// File extension for a MIME type, `.bin` when unknown
fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => ".jpg",
        "image/png" => ".png",
        "image/webp" => ".webp",
        "image/gif" => ".gif",
        "image/svg+xml" => ".svg",
        "image/bmp" => ".bmp",
        "image/x-icon" | "image/vnd.microsoft.icon" => ".ico",
        _ => ".bin",
    }
}
