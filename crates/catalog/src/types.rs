//! Public catalog types.

use themelink_protocol::AssetUri;

/// One discoverable theme bundle.
///
/// Built fresh on every scan and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemePackage {
    /// Folder name; unique within one scan.
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub author: String,
    /// Preview image (`<id>.png` at the asset root).
    pub thumbnail_ref: AssetUri,
    /// Files inside `<id>/`, sorted by name.
    pub member_refs: Vec<AssetUri>,
}

impl ThemePackage {
    /// Every identifier the remote service needs read access to.
    pub fn all_refs(&self) -> impl Iterator<Item = &AssetUri> {
        std::iter::once(&self.thumbnail_ref).chain(self.member_refs.iter())
    }
}
