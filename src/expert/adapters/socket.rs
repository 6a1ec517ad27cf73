//! Newline-delimited JSON-RPC transport over TCP.
//!
//! Each request is one JSON object per line:
//!
//! ```json
//! {"jsonrpc": "2.0", "id": 7, "method": "tools/call", "params": {"name": "analyze", "arguments": {}}}
//! ```
//!
//! Responses carry the same `id` and either a `result` or an `error` object
//! with a `message`. Lines with other ids are skipped, so a response that
//! arrives after its caller timed out never answers a later request.

use crate::expert::{
    domain::{ExpertEndpoint, ResourceContent, ToolDefinition},
    ports::{ExpertTransport, TransportError, TransportFactory, TransportResult},
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;

/// Address scheme served by [`JsonLinesTransport`].
pub const TCP_SCHEME: &str = "tcp";

const MAX_RESPONSE_BYTES: u64 = 1024 * 1024;

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ToolList {
    #[serde(default)]
    tools: Vec<ToolDefinition>,
}

/// TCP transport speaking newline-delimited JSON-RPC.
pub struct JsonLinesTransport {
    address: String,
    connection: Mutex<Option<Connection>>,
    next_id: AtomicU64,
}

impl JsonLinesTransport {
    /// Creates an unconnected transport for `host:port`.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connection: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the `host:port` address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    async fn call(&self, method: &str, params: Value) -> TransportResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut guard = self.connection.lock().await;
        let Some(connection) = guard.as_mut() else {
            return Err(TransportError::Unreachable("not connected".to_owned()));
        };

        match Self::exchange(connection, id, method, params).await {
            Ok(response) => Self::into_result(response),
            Err(err) => {
                *guard = None;
                Err(TransportError::Unreachable(err.to_string()))
            }
        }
    }

    async fn exchange(
        connection: &mut Connection,
        id: u64,
        method: &str,
        params: Value,
    ) -> io::Result<RpcResponse> {
        let request = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        let mut line = serde_json::to_vec(&request).map_err(io::Error::other)?;
        line.push(b'\n');
        connection.writer.write_all(&line).await?;
        connection.writer.flush().await?;

        loop {
            let mut buffer = String::new();
            let read = (&mut connection.reader)
                .take(MAX_RESPONSE_BYTES)
                .read_line(&mut buffer)
                .await?;
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "expert closed the connection",
                ));
            }
            if !buffer.ends_with('\n') {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "response line exceeds size limit",
                ));
            }
            let response: RpcResponse =
                serde_json::from_str(buffer.trim_end()).map_err(io::Error::other)?;
            if response.id == Some(id) {
                return Ok(response);
            }
            tracing::debug!(expected = id, received = ?response.id, "skipping stale response");
        }
    }

    fn into_result(response: RpcResponse) -> TransportResult<Value> {
        match (response.error, response.result) {
            (Some(error), _) => Err(TransportError::Remote(error.message)),
            (None, Some(result)) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }
}

#[async_trait]
impl ExpertTransport for JsonLinesTransport {
    async fn connect(&self) -> TransportResult<()> {
        let stream = TcpStream::connect(&self.address)
            .await
            .map_err(|err| TransportError::Unreachable(err.to_string()))?;
        let (read_half, write_half) = stream.into_split();
        *self.connection.lock().await = Some(Connection {
            reader: BufReader::new(read_half),
            writer: write_half,
        });
        Ok(())
    }

    async fn discover(&self) -> TransportResult<Vec<ToolDefinition>> {
        let listing = self.call("tools/list", json!({})).await?;
        let parsed: ToolList = serde_json::from_value(listing).map_err(TransportError::runtime)?;
        Ok(parsed.tools)
    }

    async fn invoke(&self, tool: &str, arguments: Value) -> TransportResult<Value> {
        self.call("tools/call", json!({"name": tool, "arguments": arguments}))
            .await
    }

    async fn read_resource(&self, uri: &str) -> TransportResult<ResourceContent> {
        let content = self.call("resources/read", json!({"uri": uri})).await?;
        serde_json::from_value(content).map_err(TransportError::runtime)
    }

    async fn close(&self) -> TransportResult<()> {
        let previous = self.connection.lock().await.take();
        if let Some(mut connection) = previous {
            connection
                .writer
                .shutdown()
                .await
                .map_err(TransportError::runtime)?;
        }
        Ok(())
    }
}

/// Builds [`JsonLinesTransport`]s for `tcp://host:port` endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketTransportFactory;

impl TransportFactory for SocketTransportFactory {
    fn create(&self, endpoint: &ExpertEndpoint) -> TransportResult<Arc<dyn ExpertTransport>> {
        if endpoint.scheme() != TCP_SCHEME {
            return Err(TransportError::UnsupportedScheme(endpoint.scheme().to_owned()));
        }
        let host_port = endpoint
            .address()
            .split_once("://")
            .map_or(endpoint.address(), |(_, rest)| rest)
            .trim_end_matches('/');
        Ok(Arc::new(JsonLinesTransport::new(host_port)))
    }
}
