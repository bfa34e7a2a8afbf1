//! Wire protocol types for themelink.
//!
//! Shared by the publish session (which talks to the remote theme service)
//! and the resource server (which answers the service's read requests).

pub mod constants;
pub mod envelope;
pub mod messages;
pub mod uri;

// Re-export primary types for convenience.
pub use constants::{MIN_SUPPORTED_VERSION, MessageType, ProtocolCompatibility};
pub use envelope::{Message, WsError};
pub use messages::{OperationResult, ProtocolVersionResponse, PublishBatchRequest};
pub use uri::{AssetUri, UriError};
