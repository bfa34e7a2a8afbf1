//! Theme package discovery.
//!
//! Themes live in an asset root as `<id>.txt` metadata files with a
//! matching `<id>/` folder holding the theme's files and an `<id>.png`
//! thumbnail next to the metadata.
//!
//! # Pipeline
//!
//! 1. **List**: [`Catalog::entries`] finds every `<id>.txt`
//! 2. **Load**: [`Catalog::load_package`] parses metadata and lists `<id>/`
//! 3. **Scan**: [`Catalog::scan`] runs both, skipping broken packages

pub mod error;
pub mod metadata;
pub mod scanner;
pub mod types;

pub use error::CatalogError;
pub use metadata::{ThemeMetadata, parse_properties};
pub use scanner::Catalog;
pub use types::ThemePackage;
