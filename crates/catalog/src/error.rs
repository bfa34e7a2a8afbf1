//! Catalog error types.

/// Errors produced while reading theme packages from disk.
///
/// Every variant is a per-package read fault: callers skip the package
/// and continue with the rest of the catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("theme folder missing for {0}")]
    MissingFolder(String),

    #[error("invalid asset name {name:?}: {reason}")]
    InvalidAssetName { name: String, reason: String },
}

impl CatalogError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
