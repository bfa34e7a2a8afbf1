//! TCP resource server.
//!
//! Accepts any number of connections, each on its own task, and answers
//! byte-range read requests through the [`AssetProvider`]. Stops accepting
//! and closes open connections when the cancellation token fires.

use std::io::SeekFrom;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::COPY_BUFFER_SIZE;
use crate::error::ServerError;
use crate::provider::AssetProvider;
use crate::wire::{ReadRequest, Status, read_request, write_error, write_ok_header};

/// Message sent with every refused request. Deliberately uninformative.
const NOT_FOUND_MESSAGE: &str = "resource not found";

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    /// 0 picks an ephemeral port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
        }
    }
}

/// TCP front-end for an [`AssetProvider`].
pub struct ResourceServer {
    provider: Arc<AssetProvider>,
    config: ServerConfig,
    cancel: CancellationToken,
}

impl ResourceServer {
    pub fn new(provider: Arc<AssetProvider>, config: ServerConfig, cancel: CancellationToken) -> Self {
        Self {
            provider,
            config,
            cancel,
        }
    }

    /// Binds the listener.
    pub async fn listen(&self) -> Result<TcpListener, ServerError> {
        let listener = TcpListener::bind(SocketAddr::new(self.config.host, self.config.port)).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "resource server listening");
        Ok(listener)
    }

    /// Accepts connections until cancelled.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        loop {
            let (stream, addr) = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = listener.accept() => match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("accept failed: {e}");
                        continue;
                    }
                },
            };

            debug!(%addr, "resource connection accepted");
            let provider = Arc::clone(&self.provider);
            let cancel = self.cancel.child_token();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(&provider, stream, cancel).await {
                    debug!(%addr, "resource connection ended: {e}");
                }
            });
        }

        info!("resource server stopped");
        Ok(())
    }

    /// Binds and serves until cancelled.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = self.listen().await?;
        self.serve(listener).await
    }
}

async fn handle_connection(
    provider: &AssetProvider,
    stream: TcpStream,
    cancel: CancellationToken,
) -> Result<(), ServerError> {
    let (reader, writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, writer);

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = read_request(&mut reader) => next,
        };

        match next {
            Ok(Some(request)) => serve_request(provider, &request, &mut writer).await?,
            Ok(None) => break,
            Err(ServerError::Protocol(msg)) => {
                debug!("malformed request: {msg}");
                write_error(&mut writer, Status::BadRequest, &msg).await?;
            }
            Err(e) => return Err(e),
        }
        writer.flush().await?;
    }

    Ok(())
}

/// Answers one request. Only I/O failures on the connection are returned.
async fn serve_request<W: AsyncWrite + Unpin>(
    provider: &AssetProvider,
    request: &ReadRequest,
    writer: &mut W,
) -> Result<(), ServerError> {
    let handle = match provider
        .open_as(&request.grantee, &request.uri, &request.mode_str())
        .await
    {
        Ok(handle) => handle,
        Err(e) => {
            debug!(uri = %request.uri, grantee = %request.grantee, error = %e, "read refused");
            return write_error(writer, Status::NotFound, NOT_FOUND_MESSAGE).await;
        }
    };

    let total_size = handle.len();
    let start = request.offset.min(total_size);
    let available = total_size - start;
    let payload_len = match request.length {
        0 => available,
        n => n.min(available),
    };

    write_ok_header(writer, total_size, payload_len).await?;

    let mut file = handle.into_file();
    file.seek(SeekFrom::Start(start)).await?;
    let copied = copy_exact(&mut file, writer, payload_len).await?;
    if copied != payload_len {
        return Err(ServerError::Protocol(format!(
            "{} shrank while serving: sent {copied} of {payload_len} bytes",
            request.uri
        )));
    }

    debug!(uri = %request.uri, offset = start, len = payload_len, "range served");
    Ok(())
}

async fn copy_exact<R, W>(reader: &mut R, writer: &mut W, len: u64) -> Result<u64, ServerError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut limited = reader.take(len);
    Ok(tokio::io::copy(&mut limited, writer).await?)
}
