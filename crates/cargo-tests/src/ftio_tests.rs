//! FTIO deferred-staging scenarios.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::harness::{read_file, seeded_payload, TestDaemon, TestTree};
    use cargo_api::{Dataset, DatasetKind};
    use cargo_client::{ftio_int, transfer_datasets};
    use cargo_coordinator::CargoConfig;

    fn ftio_config(workers: usize) -> CargoConfig {
        CargoConfig {
            workers,
            block_size_kib: 1,
            // Freshly written fixtures count as quiescent right away.
            ftio_quiescence_secs: 0.0,
            ..CargoConfig::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn armed_transfers_defer_until_the_run_trigger() {
        let tree = TestTree::new();
        let buf_root = tree.source_root.join("buffer");
        std::fs::create_dir(&buf_root).unwrap();
        for i in 0..3 {
            std::fs::write(
                buf_root.join(format!("out-{i}")),
                seeded_payload(40 + i, 3000),
            )
            .unwrap();
        }
        let dst_root = tree.target_root.join("staged");

        let daemon = TestDaemon::spawn_with(ftio_config(2)).await;

        ftio_int(&daemon.server, 0.9, 0.9, -1.0, false).await.unwrap();

        let transfer = transfer_datasets(
            &daemon.server,
            vec![Dataset::new(buf_root.to_str().unwrap(), DatasetKind::AdhocA)],
            vec![Dataset::new(dst_root.to_str().unwrap(), DatasetKind::Parallel)],
        )
        .await
        .unwrap();

        // Not dispatched: still pending after a generous pause.
        tokio::time::sleep(Duration::from_millis(700)).await;
        let status = transfer.status().await.unwrap();
        assert!(!status.done() && !status.failed());
        assert!(buf_root.join("out-0").exists());

        // Trigger the stored transfer.
        ftio_int(&daemon.server, 0.9, 0.9, -1.0, true).await.unwrap();
        let status = transfer.wait().await.unwrap();
        assert!(status.done(), "staging ended as {:?}", status.state());

        for i in 0..3u64 {
            assert_eq!(
                read_file(&dst_root.join(format!("out-{i}"))),
                seeded_payload(40 + i, 3000)
            );
            // Staged sources are unlinked afterwards.
            assert!(!buf_root.join(format!("out-{i}")).exists());
        }

        daemon.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn a_period_stages_without_an_explicit_trigger() {
        let tree = TestTree::new();
        let buf_root = tree.source_root.join("buffer");
        std::fs::create_dir(&buf_root).unwrap();
        std::fs::write(buf_root.join("epoch"), seeded_payload(9, 2048)).unwrap();
        let dst_root = tree.target_root.join("staged");

        let daemon = TestDaemon::spawn_with(ftio_config(1)).await;

        // period > 0 forces run; the scheduler fires after ~1s.
        ftio_int(&daemon.server, 0.5, 0.5, 1.0, false).await.unwrap();

        let transfer = transfer_datasets(
            &daemon.server,
            vec![Dataset::new(buf_root.to_str().unwrap(), DatasetKind::AdhocA)],
            vec![Dataset::new(dst_root.to_str().unwrap(), DatasetKind::Parallel)],
        )
        .await
        .unwrap();

        let status = transfer.wait().await.unwrap();
        assert!(status.done(), "staging ended as {:?}", status.state());
        assert_eq!(read_file(&dst_root.join("epoch")), seeded_payload(9, 2048));
        assert!(!buf_root.join("epoch").exists());

        daemon.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn young_files_wait_for_the_quiescence_window() {
        let tree = TestTree::new();
        let buf_root = tree.source_root.join("buffer");
        std::fs::create_dir(&buf_root).unwrap();
        std::fs::write(buf_root.join("hot"), b"still being written").unwrap();
        let dst_root = tree.target_root.join("staged");

        // Default 5s quiescence: a file written milliseconds ago is hot.
        let config = CargoConfig {
            workers: 1,
            block_size_kib: 1,
            ..CargoConfig::default()
        };
        let daemon = TestDaemon::spawn_with(config).await;

        ftio_int(&daemon.server, 0.9, 0.9, -1.0, true).await.unwrap();
        let transfer = transfer_datasets(
            &daemon.server,
            vec![Dataset::new(buf_root.to_str().unwrap(), DatasetKind::AdhocA)],
            vec![Dataset::new(dst_root.to_str().unwrap(), DatasetKind::Parallel)],
        )
        .await
        .unwrap();

        // The run trigger fires, but the hot file is skipped and survives.
        tokio::time::sleep(Duration::from_millis(800)).await;
        let status = transfer.status().await.unwrap();
        assert!(!status.done());
        assert!(buf_root.join("hot").exists());
        assert!(!dst_root.join("hot").exists());

        daemon.shutdown().await;
    }
}
