/*!
 * IPC Server for the bondbridge daemon
 * JSON method calls over a Unix socket, one per line
 */

use anyhow::{bail, Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tracing::Instrument;
use uuid::Uuid;

use crate::channel::{BondChannel, MethodCall, MethodResponse, MALFORMED_CALL};

/// Longest request line accepted, newline included.
const MAX_LINE_BYTES: usize = 64 * 1024;

pub struct IpcServer {
    listener: UnixListener,
    channel: Arc<BondChannel>,
}

impl IpcServer {
    pub fn new(listener: UnixListener, channel: BondChannel) -> Self {
        Self {
            listener,
            channel: Arc::new(channel),
        }
    }

    /// Bind `socket_path`, replacing a stale socket left by a previous run.
    pub fn bind(socket_path: &str, channel: BondChannel) -> Result<Self> {
        let path = Path::new(socket_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.file_type().is_socket() => {
                tracing::debug!("Removing stale socket {}", socket_path);
                fs::remove_file(path)
                    .with_context(|| format!("Failed to remove stale socket {}", socket_path))?;
            }
            Ok(_) => bail!("{} exists and is not a socket", socket_path),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("Failed to inspect {}", socket_path)),
        }

        let listener = UnixListener::bind(path)
            .with_context(|| format!("Failed to bind {}", socket_path))?;
        Ok(Self::new(listener, channel))
    }

    pub async fn run(self) -> Result<()> {
        tracing::info!("IPC server listening for connections...");

        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    tracing::debug!("New client connected");
                    let channel = Arc::clone(&self.channel);

                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, channel).await {
                            tracing::error!("Client error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

async fn handle_client(stream: UnixStream, channel: Arc<BondChannel>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        let read = (&mut reader)
            .take(MAX_LINE_BYTES as u64)
            .read_until(b'\n', &mut line)
            .await?;
        if read == 0 {
            break;
        }

        if line.len() >= MAX_LINE_BYTES && line.last() != Some(&b'\n') {
            tracing::warn!("Request line exceeds {} bytes, closing", MAX_LINE_BYTES);
            let message = format!("request line exceeds {} bytes", MAX_LINE_BYTES);
            respond(&mut writer, &MethodResponse::error(MALFORMED_CALL, message)).await?;
            return Ok(());
        }

        let request = match std::str::from_utf8(&line) {
            Ok(text) => text.trim(),
            Err(e) => {
                tracing::warn!("Malformed call: {}", e);
                let response = MethodResponse::error(MALFORMED_CALL, e.to_string());
                respond(&mut writer, &response).await?;
                continue;
            }
        };
        if request.is_empty() {
            continue;
        }
        tracing::debug!("Received request: {}", request);

        let response = dispatch(&channel, request).await;
        respond(&mut writer, &response).await?;
    }

    tracing::debug!("Client disconnected");
    Ok(())
}

async fn respond(writer: &mut OwnedWriteHalf, response: &MethodResponse) -> Result<()> {
    let mut payload = serde_json::to_vec(response)?;
    payload.push(b'\n');
    writer.write_all(&payload).await?;
    Ok(())
}

async fn dispatch(channel: &BondChannel, request: &str) -> MethodResponse {
    let call: MethodCall = match serde_json::from_str(request) {
        Ok(call) => call,
        Err(e) => {
            tracing::warn!("Malformed call: {}", e);
            return MethodResponse::error(MALFORMED_CALL, e.to_string());
        }
    };

    let span = tracing::info_span!("call", id = %Uuid::new_v4(), method = %call.method);
    channel.handle(&call).instrument(span).await
}
