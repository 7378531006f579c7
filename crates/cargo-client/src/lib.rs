//! Client library for the Cargo data-staging service.
//!
//! Mirrors the coordinator's RPC surface: submit dataset transfers, poll or
//! wait on their status, reshape bandwidth, arm FTIO mode and request
//! shutdown. All calls are async and open a fresh control connection.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use cargo_api::proto::{
    BwControlRequest, FtioRequest, GenericResponse, PingRequest, RequestStatus,
    ShutdownRequest, TransferDatasetsRequest, TransferDatasetsResponse, TransferStatusRequest,
    TransferStatusResponse, TransferStatusesRequest, TransferStatusesResponse,
};
use cargo_api::{Dataset, ErrorCode, TransferId, TransferState};
use cargo_transport::{split_address, Opcode, RpcClient, RpcClientConfig, TransportError};

/// Default polling cadence of [`Transfer::wait`].
const WAIT_POLL: Duration = Duration::from_millis(150);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("rpc {rpc} failed: {error}")]
    Rpc { rpc: &'static str, error: ErrorCode },
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// A Cargo coordinator endpoint.
#[derive(Debug, Clone)]
pub struct Server {
    protocol: String,
    host_port: String,
    address: String,
}

impl Server {
    /// Parses `PROTOCOL://host[:port]`. The protocol token is whatever the
    /// configured transport accepts.
    pub fn new(address: impl Into<String>) -> Result<Self> {
        let address = address.into();
        let (protocol, host_port) = split_address(&address)?;
        Ok(Self {
            protocol: protocol.to_string(),
            host_port: host_port.to_string(),
            address,
        })
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn connect(&self) -> Result<RpcClient> {
        debug!(address = %self.address, "connecting to coordinator");
        Ok(RpcClient::connect(&self.host_port, RpcClientConfig::default()).await?)
    }
}

/// Detailed status of a transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferStatus {
    state: TransferState,
    bw: f32,
    error: ErrorCode,
}

impl TransferStatus {
    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Whether the transfer has completed.
    pub fn done(&self) -> bool {
        self.state == TransferState::Completed
    }

    /// Whether the transfer has failed.
    pub fn failed(&self) -> bool {
        self.state == TransferState::Failed
    }

    /// Bandwidth of the transfer as last reported, MiB/s.
    pub fn bw(&self) -> f32 {
        self.bw
    }

    /// The transfer's error: `TRANSFER_IN_PROGRESS` until a terminal state
    /// is reached, the recorded outcome afterwards.
    pub fn error(&self) -> ErrorCode {
        match self.state {
            TransferState::Pending | TransferState::Running => ErrorCode::TRANSFER_IN_PROGRESS,
            _ => self.error,
        }
    }
}

/// Handle to one submitted transfer.
#[derive(Debug, Clone)]
pub struct Transfer {
    tid: TransferId,
    server: Server,
}

impl Transfer {
    /// Reattaches to an already-submitted transfer by id, e.g. from a
    /// different tool than the one that submitted it.
    pub fn attach(tid: TransferId, server: Server) -> Self {
        Self { tid, server }
    }

    pub fn tid(&self) -> TransferId {
        self.tid
    }

    /// Queries the summary status across all files of the transfer.
    pub async fn status(&self) -> Result<TransferStatus> {
        let client = self.server.connect().await?;
        let response: TransferStatusResponse = client
            .call(Opcode::TransferStatus, &TransferStatusRequest { tid: self.tid })
            .await?;
        if !response.error_code.is_ok() {
            return Err(ClientError::Rpc {
                rpc: "transfer_status",
                error: response.error_code,
            });
        }
        let status = response.status.ok_or(ClientError::Rpc {
            rpc: "transfer_status",
            error: ErrorCode::SNAFU,
        })?;
        Ok(TransferStatus {
            state: status.state,
            bw: status.bw,
            error: status.error.unwrap_or(ErrorCode::SUCCESS),
        })
    }

    /// Queries the per-file view; one entry per expanded file, bandwidth
    /// averaged across the workers of each file.
    pub async fn statuses(&self) -> Result<Vec<RequestStatus>> {
        let client = self.server.connect().await?;
        let response: TransferStatusesResponse = client
            .call(
                Opcode::TransferStatuses,
                &TransferStatusesRequest { tid: self.tid },
            )
            .await?;
        if !response.error_code.is_ok() {
            return Err(ClientError::Rpc {
                rpc: "transfer_statuses",
                error: response.error_code,
            });
        }
        Ok(response.statuses)
    }

    /// Broadcasts a throttle delta to every worker serving this transfer.
    pub async fn bw_control(&self, shaping: i16) -> Result<()> {
        let client = self.server.connect().await?;
        let response: GenericResponse = client
            .call(
                Opcode::BwControl,
                &BwControlRequest {
                    tid: self.tid,
                    shaping,
                },
            )
            .await?;
        if !response.error_code.is_ok() {
            return Err(ClientError::Rpc {
                rpc: "bw_control",
                error: response.error_code,
            });
        }
        Ok(())
    }

    /// Polls until the transfer completes or fails.
    pub async fn wait(&self) -> Result<TransferStatus> {
        let mut status = self.status().await?;
        while !status.done() && !status.failed() {
            status = self.wait_for(WAIT_POLL).await?;
        }
        Ok(status)
    }

    /// Sleeps `timeout`, then polls once.
    pub async fn wait_for(&self, timeout: Duration) -> Result<TransferStatus> {
        tokio::time::sleep(timeout).await;
        self.status().await
    }
}

/// Liveness probe.
pub async fn ping(server: &Server) -> Result<()> {
    let client = server.connect().await?;
    let response: GenericResponse = client.call(Opcode::Ping, &PingRequest {}).await?;
    if !response.error_code.is_ok() {
        return Err(ClientError::Rpc {
            rpc: "ping",
            error: response.error_code,
        });
    }
    Ok(())
}

/// Requests the transfer of a dataset collection; `sources[i]` is staged to
/// `targets[i]`.
pub async fn transfer_datasets(
    server: &Server,
    sources: Vec<Dataset>,
    targets: Vec<Dataset>,
) -> Result<Transfer> {
    let client = server.connect().await?;
    let response: TransferDatasetsResponse = client
        .call(
            Opcode::TransferDatasets,
            &TransferDatasetsRequest { sources, targets },
        )
        .await?;
    if !response.error_code.is_ok() {
        return Err(ClientError::Rpc {
            rpc: "transfer_datasets",
            error: response.error_code,
        });
    }
    let tid = response.tid.ok_or(ClientError::Rpc {
        rpc: "transfer_datasets",
        error: ErrorCode::SNAFU,
    })?;
    Ok(Transfer {
        tid,
        server: server.clone(),
    })
}

/// Convenience wrapper for a single source/target pair.
pub async fn transfer_dataset(
    server: &Server,
    source: Dataset,
    target: Dataset,
) -> Result<Transfer> {
    transfer_datasets(server, vec![source], vec![target]).await
}

/// Arms FTIO deferred-staging mode.
pub async fn ftio_int(
    server: &Server,
    confidence: f32,
    probability: f32,
    period: f32,
    run: bool,
) -> Result<()> {
    let client = server.connect().await?;
    let response: GenericResponse = client
        .call(
            Opcode::FtioInt,
            &FtioRequest {
                confidence,
                probability,
                period,
                run,
            },
        )
        .await?;
    if !response.error_code.is_ok() {
        return Err(ClientError::Rpc {
            rpc: "ftio_int",
            error: response.error_code,
        });
    }
    Ok(())
}

/// Asks the coordinator to shut down gracefully.
pub async fn shutdown(server: &Server) -> Result<()> {
    let client = server.connect().await?;
    let response: GenericResponse = client.call(Opcode::Shutdown, &ShutdownRequest {}).await?;
    if !response.error_code.is_ok() {
        return Err(ClientError::Rpc {
            rpc: "shutdown",
            error: response.error_code,
        });
    }
    Ok(())
}
