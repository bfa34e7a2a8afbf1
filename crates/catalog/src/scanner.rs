//! Asset root scanning.
//!
//! Listing is synchronous and never blocks on anything but the local
//! filesystem. Entries and member files are sorted by name so two scans of
//! an unchanged root produce identical results.

use std::path::{Path, PathBuf};

use themelink_protocol::AssetUri;
use themelink_protocol::constants::{METADATA_SUFFIX, THUMBNAIL_SUFFIX};
use tracing::{debug, warn};

use crate::error::CatalogError;
use crate::metadata::ThemeMetadata;
use crate::types::ThemePackage;

/// Theme catalog rooted at a local asset directory.
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
    authority: String,
}

impl Catalog {
    /// Creates a catalog over `root`, minting identifiers under `authority`.
    pub fn new(root: impl Into<PathBuf>, authority: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            authority: authority.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Lists the ids of every `<id>.txt` metadata file at the root.
    ///
    /// Fails only when the root itself cannot be read.
    pub fn entries(&self) -> Result<Vec<String>, CatalogError> {
        let root = self.canonical_root()?;
        let dir = std::fs::read_dir(&self.root).map_err(|e| CatalogError::io(&self.root, e))?;

        let mut ids: Vec<String> = dir
            .filter_map(|entry| entry.ok())
            .filter(|entry| is_servable_file(&root, &entry.path()))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter_map(|name| name.strip_suffix(METADATA_SUFFIX).map(str::to_string))
            .filter(|id| !id.is_empty())
            .collect();

        ids.sort();
        Ok(ids)
    }

    /// Builds one theme package from its metadata file and folder.
    pub fn load_package(&self, id: &str) -> Result<ThemePackage, CatalogError> {
        let meta_path = self.root.join(format!("{id}{METADATA_SUFFIX}"));
        let metadata = ThemeMetadata::load(&meta_path)?;

        let folder = self.root.join(id);
        if !folder.is_dir() {
            return Err(CatalogError::MissingFolder(id.to_string()));
        }

        let thumbnail_ref = self.asset_uri(&format!("{id}{THUMBNAIL_SUFFIX}"))?;
        let member_refs = list_member_files(&self.canonical_root()?, &folder)?
            .into_iter()
            .map(|name| self.asset_uri(&format!("{id}/{name}")))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(theme = %id, members = member_refs.len(), "theme package loaded");

        Ok(ThemePackage {
            id: id.to_string(),
            display_name: metadata.name_or(id),
            description: metadata.description_or(id),
            author: metadata.author_or(id),
            thumbnail_ref,
            member_refs,
        })
    }

    /// Scans the whole root. Packages that fail to load are logged and skipped;
    /// an unreadable root yields an empty list.
    pub fn scan(&self) -> Vec<ThemePackage> {
        let ids = match self.entries() {
            Ok(ids) => ids,
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "asset root unreadable");
                return Vec::new();
            }
        };

        ids.iter()
            .filter_map(|id| match self.load_package(id) {
                Ok(pkg) => Some(pkg),
                Err(e) => {
                    warn!(theme = %id, error = %e, "skipping theme package");
                    None
                }
            })
            .collect()
    }

    fn canonical_root(&self) -> Result<PathBuf, CatalogError> {
        std::fs::canonicalize(&self.root).map_err(|e| CatalogError::io(&self.root, e))
    }

    fn asset_uri(&self, relative_path: &str) -> Result<AssetUri, CatalogError> {
        AssetUri::new(&self.authority, relative_path).map_err(|e| CatalogError::InvalidAssetName {
            name: relative_path.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Symlinks are followed; the target must be a regular file under `root`,
/// the same rule the resource server applies before serving.
fn is_servable_file(root: &Path, path: &Path) -> bool {
    match std::fs::canonicalize(path) {
        Ok(target) => target.starts_with(root) && target.is_file(),
        Err(_) => false,
    }
}

/// Names of the servable files directly inside `folder`, sorted.
fn list_member_files(root: &Path, folder: &Path) -> Result<Vec<String>, CatalogError> {
    let entries = std::fs::read_dir(folder).map_err(|e| CatalogError::io(folder, e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CatalogError::io(folder, e))?;
        if !is_servable_file(root, &entry.path()) {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => warn!(folder = %folder.display(), name = ?raw, "skipping non UTF-8 file name"),
        }
    }

    names.sort();
    Ok(names)
}
