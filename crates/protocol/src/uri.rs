//! Resource identifiers handed to the remote service.
//!
//! Format: `content://<app-id>/assets/<relative-path>`. The relative path
//! always uses `/` separators and must name a file under the asset root.

use std::fmt;
use std::path::Path;

/// URI scheme of every resource identifier.
pub const CONTENT_SCHEME: &str = "content://";

/// Path segment between the authority and the relative asset path.
pub const ASSETS_SEGMENT: &str = "/assets/";

/// Errors from building or parsing an [`AssetUri`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UriError {
    #[error("not a content URI: {0}")]
    BadScheme(String),

    #[error("unexpected authority {found:?} (expected {expected:?})")]
    WrongAuthority { expected: String, found: String },

    #[error("missing assets segment: {0}")]
    MissingAssetsSegment(String),

    #[error("invalid asset path: {0}")]
    InvalidPath(String),
}

/// A validated resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetUri {
    authority: String,
    relative_path: String,
}

impl AssetUri {
    /// Builds an identifier for `relative_path` under `authority`.
    pub fn new(
        authority: impl Into<String>,
        relative_path: impl Into<String>,
    ) -> Result<Self, UriError> {
        let authority = authority.into();
        let relative_path = relative_path.into();
        validate_authority(&authority)?;
        validate_relative_path(&relative_path)?;
        Ok(Self {
            authority,
            relative_path,
        })
    }

    /// Parses an identifier string of any authority.
    pub fn parse(uri: &str) -> Result<Self, UriError> {
        let rest = uri
            .strip_prefix(CONTENT_SCHEME)
            .ok_or_else(|| UriError::BadScheme(uri.to_string()))?;
        let (authority, relative_path) = rest
            .split_once(ASSETS_SEGMENT)
            .ok_or_else(|| UriError::MissingAssetsSegment(uri.to_string()))?;
        Self::new(authority, relative_path)
    }

    /// Parses an identifier and requires it to belong to `authority`.
    pub fn parse_for(uri: &str, authority: &str) -> Result<Self, UriError> {
        let parsed = Self::parse(uri)?;
        if parsed.authority != authority {
            return Err(UriError::WrongAuthority {
                expected: authority.to_string(),
                found: parsed.authority,
            });
        }
        Ok(parsed)
    }

    /// The owning application id.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Path relative to the asset root, `/`-separated.
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }
}

impl fmt::Display for AssetUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{CONTENT_SCHEME}{}{ASSETS_SEGMENT}{}",
            self.authority, self.relative_path
        )
    }
}

impl std::str::FromStr for AssetUri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn validate_authority(authority: &str) -> Result<(), UriError> {
    if authority.is_empty() || authority.contains(['/', '\\', '\0']) {
        return Err(UriError::BadScheme(format!("invalid authority: {authority:?}")));
    }
    Ok(())
}

/// Rejects anything that could name more than one file or escape the root.
fn validate_relative_path(path: &str) -> Result<(), UriError> {
    if path.is_empty() {
        return Err(UriError::InvalidPath("empty path".into()));
    }
    if path.contains('\0') {
        return Err(UriError::InvalidPath(format!("NUL byte in path: {path:?}")));
    }
    if path.contains('\\') {
        return Err(UriError::InvalidPath(format!(
            "backslash not allowed: {path}"
        )));
    }
    if path.starts_with('/') || Path::new(path).is_absolute() {
        return Err(UriError::InvalidPath(format!(
            "absolute path not allowed: {path}"
        )));
    }
    if path.len() >= 2 && path.as_bytes()[1] == b':' {
        return Err(UriError::InvalidPath(format!(
            "drive prefix not allowed: {path}"
        )));
    }
    if path.ends_with('/') || path.contains("//") {
        return Err(UriError::InvalidPath(format!("empty segment in: {path}")));
    }

    // `Path::components` folds interior `.` away, so check raw segments.
    for segment in path.split('/') {
        match segment {
            "." => {
                return Err(UriError::InvalidPath(format!(
                    "non-canonical path: {path}"
                )));
            }
            ".." => {
                return Err(UriError::InvalidPath(format!(
                    "parent traversal not allowed: {path}"
                )));
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP: &str = "org.example.themes";

    #[test]
    fn display_matches_scheme() {
        let uri = AssetUri::new(APP, "sunset/bg.png").unwrap();
        assert_eq!(
            uri.to_string(),
            "content://org.example.themes/assets/sunset/bg.png"
        );
    }

    #[test]
    fn parse_recovers_relative_path() {
        let uri = AssetUri::parse("content://org.example.themes/assets/sunset/bg.png").unwrap();
        assert_eq!(uri.authority(), APP);
        assert_eq!(uri.relative_path(), "sunset/bg.png");
    }

    #[test]
    fn parse_display_is_identity() {
        let s = "content://org.example.themes/assets/sunset.png";
        assert_eq!(AssetUri::parse(s).unwrap().to_string(), s);
    }

    #[test]
    fn parse_rejects_other_schemes() {
        assert!(matches!(
            AssetUri::parse("file:///etc/passwd"),
            Err(UriError::BadScheme(_))
        ));
    }

    #[test]
    fn parse_rejects_missing_assets_segment() {
        assert!(matches!(
            AssetUri::parse("content://org.example.themes/files/a.png"),
            Err(UriError::MissingAssetsSegment(_))
        ));
    }

    #[test]
    fn parse_for_checks_authority() {
        let err = AssetUri::parse_for("content://other.app/assets/a.png", APP).unwrap_err();
        assert!(matches!(err, UriError::WrongAuthority { .. }));
        assert!(AssetUri::parse_for("content://org.example.themes/assets/a.png", APP).is_ok());
    }

    #[test]
    fn rejects_traversal() {
        assert!(AssetUri::new(APP, "../secret").is_err());
        assert!(AssetUri::new(APP, "sunset/../../etc/passwd").is_err());
    }

    #[test]
    fn rejects_absolute_and_prefixed_paths() {
        assert!(AssetUri::new(APP, "/etc/passwd").is_err());
        assert!(AssetUri::new(APP, "C:/Windows").is_err());
        assert!(AssetUri::new(APP, "a\\b").is_err());
    }

    #[test]
    fn rejects_non_canonical_paths() {
        assert!(AssetUri::new(APP, "").is_err());
        assert!(AssetUri::new(APP, "./sunset.png").is_err());
        assert!(AssetUri::new(APP, "sunset//bg.png").is_err());
        assert!(AssetUri::new(APP, "sunset/").is_err());
        assert!(AssetUri::new(APP, "sunset/./bg.png").is_err());
        assert!(AssetUri::new(APP, "sunset/.").is_err());
        assert!(AssetUri::parse("content://org.example.themes/assets/sunset/./bg.png").is_err());
    }

    #[test]
    fn rejects_bad_authority() {
        assert!(AssetUri::new("", "a.png").is_err());
        assert!(AssetUri::new("a/b", "a.png").is_err());
    }
}
