use serde::{Deserialize, Serialize};

/// Response to `get_protocol_version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersionResponse {
    pub version: u32,
}

/// One theme package handed to the remote service.
///
/// The service later fetches the thumbnail and every member through the
/// resource server, using the identifiers exactly as sent here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishBatchRequest {
    pub app_id: String,
    pub name: String,
    pub description: String,
    pub author: String,
    pub thumbnail_uri: String,
    pub member_uris: Vec<String>,
}

/// Generic success/failure answer from the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
