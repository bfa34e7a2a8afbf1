use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lowest remote service protocol version this plugin can publish to.
pub const MIN_SUPPORTED_VERSION: u32 = 35;

/// Timeout for request/response operations against the remote service.
pub const REMOTE_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default upper bound on waiting for the remote service binding.
pub const DEFAULT_BIND_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum WebSocket message size in bytes (4 MB).
///
/// Batch descriptions only carry identifiers, never file contents.
pub const WS_MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// File name suffix marking a theme's metadata file.
pub const METADATA_SUFFIX: &str = ".txt";

/// File name suffix of a theme's thumbnail image.
pub const THUMBNAIL_SUFFIX: &str = ".png";

/// Permission bitmask: read access to a resource.
pub const PERMISSION_READ: u32 = 1;

/// WebSocket message type identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    // Requests from plugin to service
    #[serde(rename = "get_protocol_version")]
    GetProtocolVersion,
    #[serde(rename = "publish_batch")]
    PublishBatch,

    // Responses from service to plugin
    #[serde(rename = "protocol_version")]
    ProtocolVersion,
    #[serde(rename = "operation_result")]
    OperationResult,
    #[serde(rename = "error")]
    Error,

    /// Forward compatibility: unknown message types deserialize here.
    #[serde(other)]
    Unknown,
}

/// Result of comparing the remote service's protocol version to ours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolCompatibility {
    /// Remote speaks a version at or above the floor.
    Compatible,
    /// Remote is older than [`MIN_SUPPORTED_VERSION`].
    TooOld { peer_version: u32, minimum: u32 },
}

/// Checks a peer version against an explicit floor.
pub fn check_protocol_compatibility(peer_version: u32, minimum: u32) -> ProtocolCompatibility {
    if peer_version >= minimum {
        ProtocolCompatibility::Compatible
    } else {
        ProtocolCompatibility::TooOld {
            peer_version,
            minimum,
        }
    }
}
