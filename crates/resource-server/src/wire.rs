//! TCP wire format for resource reads.
//!
//! # Wire format
//!
//! All integers are big-endian.
//!
//! ```text
//! REQUEST (service -> plugin):
//!   [2 bytes: grantee_len][grantee UTF-8]
//!   [2 bytes: uri_len][uri UTF-8]
//!   [1 byte: mode, b'r']
//!   [8 bytes: offset]
//!   [8 bytes: length, 0 = to end of file]
//!
//! RESPONSE (plugin -> service):
//!   [1 byte: status]
//!   status OK:  [8 bytes: total_size][8 bytes: payload_len][payload bytes]
//!   otherwise:  [2 bytes: message_len][message UTF-8]
//! ```
//!
//! A connection carries any number of request/response pairs; closing the
//! stream between requests ends it.

use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ServerError;

/// Response status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    BadRequest = 0x02,
}

impl Status {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Ok),
            0x01 => Some(Self::NotFound),
            0x02 => Some(Self::BadRequest),
            _ => None,
        }
    }
}

/// A byte-range read request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    pub grantee: String,
    pub uri: String,
    pub mode: u8,
    pub offset: u64,
    /// Number of bytes wanted; 0 reads to end of file.
    pub length: u64,
}

impl ReadRequest {
    /// A read-mode request for `[offset, offset + length)`.
    pub fn read(
        grantee: impl Into<String>,
        uri: impl Into<String>,
        offset: u64,
        length: u64,
    ) -> Self {
        Self {
            grantee: grantee.into(),
            uri: uri.into(),
            mode: b'r',
            offset,
            length,
        }
    }

    /// The mode byte as the provider's mode string.
    pub fn mode_str(&self) -> String {
        char::from(self.mode).to_string()
    }
}

/// A decoded response header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseHeader {
    /// `payload_len` bytes of file data follow.
    Ok { total_size: u64, payload_len: u64 },
    Failed { status: Status, message: String },
}

/// Writes a request frame.
pub async fn write_request<W: AsyncWrite + Unpin>(
    writer: &mut W,
    request: &ReadRequest,
) -> Result<(), ServerError> {
    write_short_string(writer, "grantee", &request.grantee).await?;
    write_short_string(writer, "uri", &request.uri).await?;
    writer.write_u8(request.mode).await?;
    writer.write_u64(request.offset).await?;
    writer.write_u64(request.length).await?;
    Ok(())
}

/// Reads a request frame.
///
/// Returns `None` if the peer closed the stream before a new frame started.
/// A frame whose strings are not UTF-8 is consumed in full and reported as
/// [`ServerError::Protocol`], so the stream stays usable.
pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<ReadRequest>, ServerError> {
    let grantee_len = match reader.read_u16().await {
        Ok(n) => n,
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let grantee = read_bytes(reader, grantee_len).await?;
    let uri_len = reader.read_u16().await?;
    let uri = read_bytes(reader, uri_len).await?;
    let mode = reader.read_u8().await?;
    let offset = reader.read_u64().await?;
    let length = reader.read_u64().await?;

    let grantee = String::from_utf8(grantee)
        .map_err(|e| ServerError::Protocol(format!("invalid UTF-8 grantee: {e}")))?;
    let uri = String::from_utf8(uri)
        .map_err(|e| ServerError::Protocol(format!("invalid UTF-8 uri: {e}")))?;

    Ok(Some(ReadRequest {
        grantee,
        uri,
        mode,
        offset,
        length,
    }))
}

/// Writes the header of a successful response. The caller streams the payload.
pub async fn write_ok_header<W: AsyncWrite + Unpin>(
    writer: &mut W,
    total_size: u64,
    payload_len: u64,
) -> Result<(), ServerError> {
    writer.write_u8(Status::Ok as u8).await?;
    writer.write_u64(total_size).await?;
    writer.write_u64(payload_len).await?;
    Ok(())
}

/// Writes a failure response.
pub async fn write_error<W: AsyncWrite + Unpin>(
    writer: &mut W,
    status: Status,
    message: &str,
) -> Result<(), ServerError> {
    writer.write_u8(status as u8).await?;
    let message = truncate_to_u16(message);
    writer.write_u16(message.len() as u16).await?;
    writer.write_all(message.as_bytes()).await?;
    Ok(())
}

/// Reads a response header. On [`ResponseHeader::Ok`] the payload follows.
pub async fn read_response_header<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<ResponseHeader, ServerError> {
    let byte = reader.read_u8().await?;
    let status = Status::from_byte(byte)
        .ok_or_else(|| ServerError::Protocol(format!("unknown status byte {byte:#04x}")))?;

    if status == Status::Ok {
        let total_size = reader.read_u64().await?;
        let payload_len = reader.read_u64().await?;
        return Ok(ResponseHeader::Ok {
            total_size,
            payload_len,
        });
    }

    let len = reader.read_u16().await?;
    let message = String::from_utf8(read_bytes(reader, len).await?)
        .map_err(|e| ServerError::Protocol(format!("invalid UTF-8 message: {e}")))?;
    Ok(ResponseHeader::Failed { status, message })
}

async fn write_short_string<W: AsyncWrite + Unpin>(
    writer: &mut W,
    field: &str,
    value: &str,
) -> Result<(), ServerError> {
    let len = value.len();
    if len > u16::MAX as usize {
        return Err(ServerError::Protocol(format!(
            "{field} too long: {len} bytes (max {})",
            u16::MAX
        )));
    }
    writer.write_u16(len as u16).await?;
    writer.write_all(value.as_bytes()).await?;
    Ok(())
}

async fn read_bytes<R: AsyncRead + Unpin>(reader: &mut R, len: u16) -> Result<Vec<u8>, ServerError> {
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

fn truncate_to_u16(message: &str) -> &str {
    if message.len() <= u16::MAX as usize {
        return message;
    }
    let mut end = u16::MAX as usize;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    &message[..end]
}
