use super::PipelineError;
use crate::document::META_SOURCE_PAGE;
use crate::item::{generate_id, Item};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

const PREFIX_LEN: usize = 20;
const HASH_LEN: usize = 8;

/// Folder layout used by the save processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveLayout {
    /// `<site>/<safe(id)>/`
    Flat,
    /// `<site>/<safe(parent id)>/<safe(id)>/`, parent being the source page
    GroupByParent,
}

impl SaveLayout {
    /// Parses a processor `method` value
    pub fn from_method(method: &str) -> Result<Self, PipelineError> {
        match method {
            "default" => Ok(SaveLayout::Flat),
            "group_by_parent" => Ok(SaveLayout::GroupByParent),
            other => Err(PipelineError::UnknownSaveLayout(other.to_string())),
        }
    }

    /// Folder the item's own folder is created in
    ///
    /// Items without a source page fall back to the site folder.
    pub fn destination(&self, site_dir: &Path, item: &Item) -> PathBuf {
        match self {
            SaveLayout::Flat => site_dir.to_path_buf(),
            SaveLayout::GroupByParent => match item.response_meta(META_SOURCE_PAGE) {
                Some(parent) => site_dir.join(safe_folder_name(&generate_id(parent))),
                None => site_dir.to_path_buf(),
            },
        }
    }
}

/// Shortens a name into a folder name that stays unique
///
/// The first 20 characters (spaces turned into `_`) are kept and followed by
/// `_` and the first 8 hex digits of the SHA-256 of the full name.
///
/// # Examples
///
/// ```
/// use statewalk::pipeline::safe_folder_name;
///
/// let name = safe_folder_name("catalogue_a-light-in-the-attic_1000_index.html");
/// assert!(name.starts_with("catalogue_a-light-in_"));
/// assert_eq!(name.len(), 20 + 1 + 8);
/// ```
pub fn safe_folder_name(name: &str) -> String {
    let prefix: String = name.chars().take(PREFIX_LEN).collect();
    let prefix = prefix.trim_end().replace(' ', "_");
    let digest = hex::encode(Sha256::digest(name.as_bytes()));
    format!("{}_{}", prefix, &digest[..HASH_LEN])
}
