/*!
 * bondbridge Daemon Client
 * JSON method calls to bondbridged
 */

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

#[derive(Debug, Serialize)]
pub struct MethodCall {
    pub method: String,
    pub arguments: Value,
}

impl MethodCall {
    pub fn create_bond(address: &str) -> Self {
        Self {
            method: "createBond".to_string(),
            arguments: json!({ "address": address }),
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MethodResponse {
    Success { result: Value },
    Error {
        code: String,
        message: String,
        details: Option<Value>,
    },
    NotImplemented,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot reach bondbridged at {path}: {source}")]
    Connect {
        path: String,
        source: std::io::Error,
    },
    #[error("daemon closed the connection without responding")]
    NoResponse,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid response: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct BondClient {
    socket_path: PathBuf,
}

impl BondClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub async fn call(&self, call: &MethodCall) -> Result<MethodResponse, ClientError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| ClientError::Connect {
                path: self.socket_path.display().to_string(),
                source,
            })?;
        let (reader, mut writer) = stream.into_split();

        let mut request = serde_json::to_vec(call)?;
        request.push(b'\n');
        writer.write_all(&request).await?;
        tracing::debug!("Sent {} call", call.method);

        let mut lines = BufReader::new(reader).lines();
        let line = lines.next_line().await?.ok_or(ClientError::NoResponse)?;

        Ok(serde_json::from_str(&line)?)
    }

    pub async fn create_bond(&self, address: &str) -> Result<MethodResponse, ClientError> {
        self.call(&MethodCall::create_bond(address)).await
    }
}
