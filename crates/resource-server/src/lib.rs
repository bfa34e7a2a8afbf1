//! Scoped resource server.
//!
//! [`AssetProvider`] answers open requests for `content://<app-id>/assets/...`
//! identifiers, serving a file only when the shared grant registry allows
//! it. [`ResourceServer`] exposes the provider over a small TCP protocol
//! so the remote theme service can fetch byte ranges.
//!
//! # Wire format
//!
//! See the [`wire`] module for the byte layout.

pub mod error;
pub mod provider;
pub mod server;
pub mod wire;

pub use error::{ProviderError, ServerError};
pub use provider::{AssetHandle, AssetProvider};
pub use server::{ResourceServer, ServerConfig};
pub use wire::{ReadRequest, Status};

/// Buffer size for streaming file bytes (64 KB).
pub const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// The only open mode the provider accepts.
pub const READ_MODE: &str = "r";
