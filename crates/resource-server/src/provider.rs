//! Grant-checked access to files under the asset root.
//!
//! Only read access exists. The record operations (`query`, `insert`,
//! `update`, `delete`, `get_type`) are accepted and do nothing.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use themelink_grants::GrantRegistry;
use themelink_protocol::AssetUri;
use themelink_protocol::constants::PERMISSION_READ;
use tokio::fs::File;
use tracing::{debug, trace};

use crate::READ_MODE;
use crate::error::ProviderError;

/// An open, read-only resource. Dropping it closes the file.
#[derive(Debug)]
pub struct AssetHandle {
    uri: AssetUri,
    path: PathBuf,
    file: File,
    len: u64,
}

impl AssetHandle {
    pub fn uri(&self) -> &AssetUri {
        &self.uri
    }

    /// Canonical location on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File size at open time.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn into_file(self) -> File {
        self.file
    }
}

/// Serves files from `root` for identifiers under `authority`.
#[derive(Debug)]
pub struct AssetProvider {
    root: PathBuf,
    authority: String,
    grants: Arc<GrantRegistry>,
}

impl AssetProvider {
    pub fn new(
        root: impl Into<PathBuf>,
        authority: impl Into<String>,
        grants: Arc<GrantRegistry>,
    ) -> Self {
        Self {
            root: root.into(),
            authority: authority.into(),
            grants,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Opens `identifier` if anyone holds a read grant on it.
    pub async fn open(&self, identifier: &str, mode: &str) -> Result<AssetHandle, ProviderError> {
        self.open_checked(None, identifier, mode).await
    }

    /// Opens `identifier` if `grantee` holds a read grant on it.
    pub async fn open_as(
        &self,
        grantee: &str,
        identifier: &str,
        mode: &str,
    ) -> Result<AssetHandle, ProviderError> {
        self.open_checked(Some(grantee), identifier, mode).await
    }

    async fn open_checked(
        &self,
        grantee: Option<&str>,
        identifier: &str,
        mode: &str,
    ) -> Result<AssetHandle, ProviderError> {
        if mode != READ_MODE {
            return Err(ProviderError::WriteDenied(mode.to_string()));
        }

        let uri = AssetUri::parse_for(identifier, &self.authority)
            .map_err(|e| ProviderError::InvalidIdentifier(format!("{identifier}: {e}")))?;

        let granted = match grantee {
            Some(grantee) => self.grants.check(&uri, grantee, PERMISSION_READ),
            None => self.grants.is_readable(&uri),
        };
        if !granted {
            debug!(%uri, grantee = grantee.unwrap_or("-"), "open refused, no grant");
            return Err(ProviderError::NotGranted(identifier.to_string()));
        }

        let path = self.resolve(&uri).await?;
        let file = File::open(&path).await.map_err(|e| io_error(&path, e))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| io_error(&path, e))?
            .len();

        trace!(%uri, path = %path.display(), len, "resource opened");
        Ok(AssetHandle {
            uri,
            path,
            file,
            len,
        })
    }

    /// Maps `uri` to a regular file that stays inside the canonical root.
    async fn resolve(&self, uri: &AssetUri) -> Result<PathBuf, ProviderError> {
        let root = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(|e| io_error(&self.root, e))?;

        let candidate = root.join(uri.relative_path());
        let path = match tokio::fs::canonicalize(&candidate).await {
            Ok(path) => path,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ProviderError::NotFound(uri.to_string()));
            }
            Err(e) => return Err(io_error(&candidate, e)),
        };

        if !path.starts_with(&root) {
            debug!(%uri, path = %path.display(), "resolved outside the asset root");
            return Err(ProviderError::NotFound(uri.to_string()));
        }

        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| io_error(&path, e))?;
        if !meta.is_file() {
            return Err(ProviderError::NotFound(uri.to_string()));
        }

        Ok(path)
    }

    pub fn query(&self, _identifier: &str, _projection: &[&str]) -> Vec<HashMap<String, String>> {
        Vec::new()
    }

    pub fn insert(&self, _identifier: &str, _values: &HashMap<String, String>) -> Option<String> {
        None
    }

    pub fn update(&self, _identifier: &str, _values: &HashMap<String, String>) -> usize {
        0
    }

    pub fn delete(&self, _identifier: &str) -> usize {
        0
    }

    pub fn get_type(&self, _identifier: &str) -> Option<String> {
        None
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ProviderError {
    ProviderError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    const APP: &str = "org.example.themes";
    const SERVICE: &str = "org.example.service";

    fn setup() -> (tempfile::TempDir, Arc<GrantRegistry>, AssetProvider) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sunset.png"), b"THUMB").unwrap();
        std::fs::create_dir(dir.path().join("sunset")).unwrap();
        std::fs::write(dir.path().join("sunset/bg.png"), b"BACKGROUND").unwrap();

        let grants = Arc::new(GrantRegistry::new());
        let provider = AssetProvider::new(dir.path(), APP, grants.clone());
        (dir, grants, provider)
    }

    fn id(rel: &str) -> String {
        format!("content://{APP}/assets/{rel}")
    }

    fn uri(rel: &str) -> AssetUri {
        AssetUri::new(APP, rel).unwrap()
    }

    #[tokio::test]
    async fn granted_resource_opens_with_contents() {
        let (_dir, grants, provider) = setup();
        grants.grant_read(&uri("sunset/bg.png"), SERVICE);

        let handle = provider.open(&id("sunset/bg.png"), "r").await.unwrap();
        assert_eq!(handle.len(), 10);
        assert_eq!(handle.uri(), &uri("sunset/bg.png"));

        let mut contents = Vec::new();
        handle.into_file().read_to_end(&mut contents).await.unwrap();
        assert_eq!(contents, b"BACKGROUND");
    }

    #[tokio::test]
    async fn ungranted_resource_is_refused() {
        let (_dir, _grants, provider) = setup();
        let err = provider.open(&id("sunset/bg.png"), "r").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotGranted(_)));
    }

    #[tokio::test]
    async fn grant_then_open_interleavings() {
        let (_dir, grants, provider) = setup();
        let bg = uri("sunset/bg.png");

        assert!(provider.open(&id("sunset/bg.png"), "r").await.is_err());
        grants.grant_read(&bg, SERVICE);
        assert!(provider.open(&id("sunset/bg.png"), "r").await.is_ok());
        // a grant on one file does not open its sibling
        assert!(provider.open(&id("sunset.png"), "r").await.is_err());
        grants.revoke(&bg, SERVICE);
        assert!(provider.open(&id("sunset/bg.png"), "r").await.is_err());
    }

    #[tokio::test]
    async fn open_as_checks_the_grantee() {
        let (_dir, grants, provider) = setup();
        grants.grant_read(&uri("sunset.png"), SERVICE);

        assert!(provider.open_as(SERVICE, &id("sunset.png"), "r").await.is_ok());
        let err = provider
            .open_as("org.example.other", &id("sunset.png"), "r")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotGranted(_)));
    }

    #[tokio::test]
    async fn write_modes_are_denied() {
        let (_dir, grants, provider) = setup();
        grants.grant_read(&uri("sunset.png"), SERVICE);

        for mode in ["w", "rw", "wa", "rwt", ""] {
            let err = provider.open(&id("sunset.png"), mode).await.unwrap_err();
            assert!(matches!(err, ProviderError::WriteDenied(_)), "mode {mode:?}");
        }
    }

    #[tokio::test]
    async fn malformed_or_foreign_identifiers_are_invalid() {
        let (_dir, _grants, provider) = setup();
        for identifier in [
            "file:///etc/passwd",
            "content://org.other.app/assets/sunset.png",
            "content://org.example.themes/files/sunset.png",
            "content://org.example.themes/assets/../secret",
        ] {
            let err = provider.open(identifier, "r").await.unwrap_err();
            assert!(
                matches!(err, ProviderError::InvalidIdentifier(_)),
                "{identifier}"
            );
        }
    }

    #[tokio::test]
    async fn granted_but_missing_file_is_not_found() {
        let (_dir, grants, provider) = setup();
        grants.grant_read(&uri("sunset/gone.png"), SERVICE);
        let err = provider.open(&id("sunset/gone.png"), "r").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[tokio::test]
    async fn directories_are_not_served() {
        let (_dir, grants, provider) = setup();
        grants.grant_read(&uri("sunset"), SERVICE);
        let err = provider.open(&id("sunset"), "r").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_escaping_the_root_is_not_found() {
        let (dir, grants, provider) = setup();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret"), b"SECRET").unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("secret"),
            dir.path().join("sunset/link.png"),
        )
        .unwrap();

        grants.grant_read(&uri("sunset/link.png"), SERVICE);
        let err = provider.open(&id("sunset/link.png"), "r").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[test]
    fn record_operations_are_noops() {
        let (_dir, _grants, provider) = setup();
        let values = HashMap::from([("k".to_string(), "v".to_string())]);
        assert!(provider.query(&id("sunset.png"), &["name"]).is_empty());
        assert_eq!(provider.insert(&id("sunset.png"), &values), None);
        assert_eq!(provider.update(&id("sunset.png"), &values), 0);
        assert_eq!(provider.delete(&id("sunset.png")), 0);
        assert_eq!(provider.get_type(&id("sunset.png")), None);
    }
}
