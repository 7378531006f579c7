//! Graceful-shutdown behaviour.

#[cfg(test)]
mod tests {
    use crate::harness::{seeded_payload, TestDaemon, TestTree};
    use cargo_api::{Dataset, ErrorCode, TransferState};
    use cargo_client::{shutdown, transfer_datasets};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn shutdown_terminates_a_running_transfer() {
        let tree = TestTree::new();
        let source = tree.source_root.join("big");
        std::fs::write(&source, seeded_payload(3, 8 * 1024 * 1024)).unwrap();
        let target = tree.target_path(0);

        let daemon = TestDaemon::spawn(2).await;
        let transfer = transfer_datasets(
            &daemon.server,
            vec![Dataset::posix(source.to_str().unwrap())],
            vec![Dataset::posix(target.to_str().unwrap())],
        )
        .await
        .unwrap();

        // Throttle so the transfer is still in flight when shutdown lands;
        // the delta is applied on the workers' next message round.
        transfer.bw_control(5).await.unwrap();
        shutdown(&daemon.server).await.unwrap();

        let coordinator = daemon.coordinator.clone();
        // The full wind-down (listener → ftio → cohort → control) must
        // complete: every worker reaches the exit barrier exactly once.
        daemon.shutdown().await;

        // The in-flight operation was terminated and reported upstream.
        let status = coordinator.transfer_status(transfer.tid()).unwrap();
        assert!(status.state.is_terminal());
        if status.state == TransferState::Failed {
            assert_eq!(status.error, Some(ErrorCode::OTHER));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn shutdown_with_an_idle_cohort_completes() {
        let daemon = TestDaemon::spawn(3).await;
        shutdown(&daemon.server).await.unwrap();
        daemon.shutdown().await;
    }
}
