//! Request/response RPC over framed TCP connections.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::protocol::{Frame, Opcode};
use crate::tcp::TcpConnection;

/// Configuration for an RPC client.
#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    /// Response timeout in milliseconds.
    pub response_timeout_ms: u64,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: 30_000,
        }
    }
}

/// RPC client multiplexing calls over one connection.
pub struct RpcClient {
    conn: Arc<TcpConnection>,
    config: RpcClientConfig,
    next_id: AtomicU64,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Frame>>>>,
    reader_handle: tokio::task::JoinHandle<()>,
}

impl RpcClient {
    /// Connects to `host:port` and starts the background reader task.
    pub async fn connect(addr: &str, config: RpcClientConfig) -> Result<Self> {
        let conn = Arc::new(TcpConnection::connect(addr).await?);
        Ok(Self::new(conn, config))
    }

    /// Wraps an existing connection.
    pub fn new(conn: Arc<TcpConnection>, config: RpcClientConfig) -> Self {
        let pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Frame>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let reader_conn = conn.clone();
        let reader_pending = pending.clone();
        let reader_handle = tokio::spawn(async move {
            loop {
                match reader_conn.recv_frame().await {
                    Ok(frame) => {
                        let request_id = frame.header.request_id;
                        let mut map = reader_pending.lock().await;
                        if let Some(tx) = map.remove(&request_id) {
                            let _ = tx.send(frame);
                        } else {
                            debug!(request_id, "dropping response with no waiter");
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "RPC reader stopping");
                        break;
                    }
                }
            }
        });

        Self {
            conn,
            config,
            next_id: AtomicU64::new(1),
            pending,
            reader_handle,
        }
    }

    /// Sends a request and waits for the matching response payload.
    pub async fn call<Req, Resp>(&self, opcode: Opcode, request: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = Frame::request(opcode, request_id, request)?;

        let (tx, rx) = oneshot::channel();
        {
            let mut map = self.pending.lock().await;
            map.insert(request_id, tx);
        }

        self.conn.send_frame(&frame).await?;

        let timeout = Duration::from_millis(self.config.response_timeout_ms);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response.decode(),
            Ok(Err(_)) => Err(TransportError::ConnectionReset),
            Err(_) => {
                let mut map = self.pending.lock().await;
                map.remove(&request_id);
                Err(TransportError::RequestTimeout {
                    request_id,
                    timeout_ms: self.config.response_timeout_ms,
                })
            }
        }
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.reader_handle.abort();
    }
}

/// Server-side dispatch target: one call per inbound request frame.
#[async_trait]
pub trait RpcHandler: Send + Sync + 'static {
    /// Handles a request and returns the encoded response payload.
    async fn handle(&self, opcode: Opcode, request_id: u64, payload: &[u8]) -> Result<Vec<u8>>;
}

/// RPC server: accepts connections and dispatches frames to a handler.
pub struct RpcServer;

impl RpcServer {
    /// Runs the accept loop forever, one task per connection.
    pub async fn serve(listener: TcpListener, handler: Arc<dyn RpcHandler>) -> Result<()> {
        loop {
            let (stream, peer_addr) = listener.accept().await?;
            debug!(peer = %peer_addr, "accepted control connection");
            let handler = handler.clone();
            tokio::spawn(async move {
                let conn = TcpConnection::from_stream(stream);
                loop {
                    let frame = match conn.recv_frame().await {
                        Ok(f) => f,
                        Err(e) => {
                            debug!(peer = conn.peer(), error = %e, "control connection closed");
                            break;
                        }
                    };

                    let opcode = frame.header.opcode;
                    let request_id = frame.header.request_id;
                    match handler.handle(opcode, request_id, &frame.payload).await {
                        Ok(payload) => {
                            let response = Frame {
                                header: crate::protocol::FrameHeader::new(
                                    opcode,
                                    request_id,
                                    payload.len() as u32,
                                    crate::protocol::FrameFlags::RESPONSE,
                                ),
                                payload,
                            };
                            if let Err(e) = conn.send_frame(&response).await {
                                warn!(error = %e, "failed to send response");
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(rpc = opcode.name(), error = %e, "handler error");
                        }
                    }
                }
            });
        }
    }
}
