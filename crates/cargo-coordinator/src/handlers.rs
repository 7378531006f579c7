//! RPC handler wiring the control transport to the coordinator.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use cargo_api::proto::{
    BwControlRequest, FtioRequest, GenericResponse, TransferDatasetsRequest,
    TransferDatasetsResponse, TransferStatusRequest, TransferStatusResponse,
    TransferStatusesRequest, TransferStatusesResponse,
};
use cargo_api::ErrorCode;
use cargo_transport::{Opcode, RpcHandler, TransportError};

use crate::coordinator::Coordinator;

/// Decodes request frames, invokes the coordinator and encodes responses.
pub struct CoordinatorHandler {
    coordinator: Arc<Coordinator>,
}

impl CoordinatorHandler {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, TransportError> {
        bincode::serialize(value).map_err(|e| TransportError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl RpcHandler for CoordinatorHandler {
    async fn handle(
        &self,
        opcode: Opcode,
        request_id: u64,
        payload: &[u8],
    ) -> Result<Vec<u8>, TransportError> {
        let op_id = self.coordinator.next_op_id();

        match opcode {
            Opcode::Ping => {
                let error_code = self.coordinator.ping();
                info!(op_id, rpc = opcode.name(), %error_code, "rpc served");
                Self::encode(&GenericResponse { op_id, error_code })
            }

            Opcode::TransferDatasets => {
                let req: TransferDatasetsRequest = bincode::deserialize(payload)
                    .map_err(|e| TransportError::Serialization(e.to_string()))?;
                info!(
                    op_id,
                    rpc = opcode.name(),
                    request_id,
                    nsources = req.sources.len(),
                    ntargets = req.targets.len(),
                    "rpc received"
                );
                let (error_code, tid) =
                    match self.coordinator.transfer_datasets(req.sources, req.targets) {
                        Ok(tid) => (ErrorCode::SUCCESS, Some(tid)),
                        Err(ec) => (ec, None),
                    };
                info!(op_id, rpc = opcode.name(), %error_code, ?tid, "rpc served");
                Self::encode(&TransferDatasetsResponse {
                    op_id,
                    error_code,
                    tid,
                })
            }

            Opcode::TransferStatus => {
                let req: TransferStatusRequest = bincode::deserialize(payload)
                    .map_err(|e| TransportError::Serialization(e.to_string()))?;
                let (error_code, status) = match self.coordinator.transfer_status(req.tid) {
                    Ok(status) => (ErrorCode::SUCCESS, Some(status)),
                    Err(ec) => (ec, None),
                };
                info!(op_id, rpc = opcode.name(), tid = req.tid, %error_code, "rpc served");
                Self::encode(&TransferStatusResponse {
                    op_id,
                    error_code,
                    status,
                })
            }

            Opcode::TransferStatuses => {
                let req: TransferStatusesRequest = bincode::deserialize(payload)
                    .map_err(|e| TransportError::Serialization(e.to_string()))?;
                let (error_code, statuses) = match self.coordinator.transfer_statuses(req.tid) {
                    Ok(statuses) => (ErrorCode::SUCCESS, statuses),
                    Err(ec) => (ec, Vec::new()),
                };
                info!(op_id, rpc = opcode.name(), tid = req.tid, %error_code, "rpc served");
                Self::encode(&TransferStatusesResponse {
                    op_id,
                    error_code,
                    statuses,
                })
            }

            Opcode::BwControl => {
                let req: BwControlRequest = bincode::deserialize(payload)
                    .map_err(|e| TransportError::Serialization(e.to_string()))?;
                let error_code = self.coordinator.bw_control(req.tid, req.shaping);
                info!(
                    op_id,
                    rpc = opcode.name(),
                    tid = req.tid,
                    shaping = req.shaping,
                    %error_code,
                    "rpc served"
                );
                Self::encode(&GenericResponse { op_id, error_code })
            }

            Opcode::FtioInt => {
                let req: FtioRequest = bincode::deserialize(payload)
                    .map_err(|e| TransportError::Serialization(e.to_string()))?;
                let error_code = self
                    .coordinator
                    .ftio_int(req.confidence, req.probability, req.period, req.run);
                info!(op_id, rpc = opcode.name(), %error_code, "rpc served");
                Self::encode(&GenericResponse { op_id, error_code })
            }

            Opcode::Shutdown => {
                let error_code = self.coordinator.shutdown();
                info!(op_id, rpc = opcode.name(), %error_code, "rpc served");
                Self::encode(&GenericResponse { op_id, error_code })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cargo_api::proto::PingRequest;
    use cargo_api::Dataset;
    use cargo_transport::in_proc_cohort;

    use crate::config::CargoConfig;

    // The endpoints are returned alongside the handler so the cohort side
    // of the channels stays open for broadcasts.
    fn handler() -> (CoordinatorHandler, Vec<cargo_transport::WorkerEndpoint>) {
        let (controller, endpoints) = in_proc_cohort(1);
        let handler = CoordinatorHandler::new(Coordinator::new(controller, &CargoConfig::default()));
        (handler, endpoints)
    }

    async fn call<Req: serde::Serialize, Resp: serde::de::DeserializeOwned>(
        handler: &CoordinatorHandler,
        opcode: Opcode,
        request: &Req,
    ) -> Resp {
        let payload = bincode::serialize(request).unwrap();
        let response = handler.handle(opcode, 1, &payload).await.unwrap();
        bincode::deserialize(&response).unwrap()
    }

    #[tokio::test]
    async fn ping_returns_success_and_increments_op_ids() {
        let (handler, _endpoints) = handler();

        let first: GenericResponse = call(&handler, Opcode::Ping, &PingRequest {}).await;
        let second: GenericResponse = call(&handler, Opcode::Ping, &PingRequest {}).await;
        assert!(first.error_code.is_ok());
        assert!(second.error_code.is_ok());
        assert!(second.op_id > first.op_id);
    }

    #[tokio::test]
    async fn mismatched_transfer_reports_snafu_without_a_tid() {
        let (handler, _endpoints) = handler();

        let response: TransferDatasetsResponse = call(
            &handler,
            Opcode::TransferDatasets,
            &TransferDatasetsRequest {
                sources: vec![Dataset::posix("/a"), Dataset::posix("/b")],
                targets: vec![Dataset::posix("/c")],
            },
        )
        .await;
        assert_eq!(response.error_code, ErrorCode::SNAFU);
        assert!(response.tid.is_none());
    }

    #[tokio::test]
    async fn status_of_an_unknown_tid_reports_no_such_transfer() {
        let (handler, _endpoints) = handler();

        let response: TransferStatusResponse = call(
            &handler,
            Opcode::TransferStatus,
            &TransferStatusRequest { tid: 404 },
        )
        .await;
        assert_eq!(response.error_code, ErrorCode::NO_SUCH_TRANSFER);
        assert!(response.status.is_none());

        let response: TransferStatusesResponse = call(
            &handler,
            Opcode::TransferStatuses,
            &TransferStatusesRequest { tid: 404 },
        )
        .await;
        assert_eq!(response.error_code, ErrorCode::NO_SUCH_TRANSFER);
        assert!(response.statuses.is_empty());
    }

    #[tokio::test]
    async fn bw_control_and_ftio_acknowledge() {
        let (handler, _endpoints) = handler();

        let response: GenericResponse = call(
            &handler,
            Opcode::BwControl,
            &BwControlRequest { tid: 1, shaping: 3 },
        )
        .await;
        assert!(response.error_code.is_ok());

        let response: GenericResponse = call(
            &handler,
            Opcode::FtioInt,
            &FtioRequest {
                confidence: 0.9,
                probability: 0.9,
                period: 2.0,
                run: false,
            },
        )
        .await;
        assert!(response.error_code.is_ok());
    }

    #[tokio::test]
    async fn malformed_payloads_are_rejected() {
        let (handler, _endpoints) = handler();
        let err = handler
            .handle(Opcode::TransferDatasets, 1, &[0xFF, 0x01])
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Serialization(_)));
    }
}
