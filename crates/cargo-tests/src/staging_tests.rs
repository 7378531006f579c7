//! Round-trip staging scenarios through the full service.

#[cfg(test)]
mod tests {
    use crate::harness::{read_file, seeded_payload, TestDaemon, TestTree};
    use cargo_api::{Dataset, DatasetKind};
    use cargo_client::transfer_datasets;

    fn datasets(paths: &[std::path::PathBuf], kind: DatasetKind) -> Vec<Dataset> {
        paths
            .iter()
            .map(|p| Dataset::new(p.to_str().unwrap(), kind))
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_read_ten_files_round_trips() {
        let tree = TestTree::new();
        let sources = tree.populate_sources(10, 1000);
        let targets: Vec<_> = (0..10).map(|i| tree.target_path(i)).collect();

        let daemon = TestDaemon::spawn(3).await;
        let transfer = transfer_datasets(
            &daemon.server,
            datasets(&sources, DatasetKind::Parallel),
            datasets(&targets, DatasetKind::Posix),
        )
        .await
        .unwrap();

        let status = transfer.wait().await.unwrap();
        assert!(status.done(), "transfer ended as {:?}", status.state());

        for (i, target) in targets.iter().enumerate() {
            assert_eq!(read_file(target), seeded_payload(i as u64, 1000));
        }

        daemon.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_write_ten_files_round_trips() {
        let tree = TestTree::new();
        let sources = tree.populate_sources(10, 10_000);
        let targets: Vec<_> = (0..10).map(|i| tree.target_path(i)).collect();

        let daemon = TestDaemon::spawn(3).await;
        let transfer = transfer_datasets(
            &daemon.server,
            datasets(&sources, DatasetKind::Posix),
            datasets(&targets, DatasetKind::Parallel),
        )
        .await
        .unwrap();

        let status = transfer.wait().await.unwrap();
        assert!(status.done(), "transfer ended as {:?}", status.state());

        for (i, target) in targets.iter().enumerate() {
            assert_eq!(read_file(target), seeded_payload(i as u64, 10_000));
        }

        daemon.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn repeated_transfer_overwrites_the_first_copy() {
        let tree = TestTree::new();
        let sources = tree.populate_sources(1, 4096);
        let targets = vec![tree.target_path(0)];

        let daemon = TestDaemon::spawn(2).await;
        for _ in 0..2 {
            let transfer = transfer_datasets(
                &daemon.server,
                datasets(&sources, DatasetKind::Parallel),
                datasets(&targets, DatasetKind::Posix),
            )
            .await
            .unwrap();
            assert!(transfer.wait().await.unwrap().done());
        }

        assert_eq!(read_file(&targets[0]), seeded_payload(0, 4096));
        daemon.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn empty_source_produces_an_empty_target() {
        let tree = TestTree::new();
        let source = tree.source_root.join("empty");
        std::fs::write(&source, b"").unwrap();
        let target = tree.target_path(0);

        let daemon = TestDaemon::spawn(2).await;
        let transfer = transfer_datasets(
            &daemon.server,
            vec![Dataset::new(source.to_str().unwrap(), DatasetKind::Parallel)],
            vec![Dataset::new(target.to_str().unwrap(), DatasetKind::Posix)],
        )
        .await
        .unwrap();

        assert!(transfer.wait().await.unwrap().done());
        assert_eq!(std::fs::metadata(&target).unwrap().len(), 0);
        daemon.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn single_block_and_ragged_sizes_round_trip() {
        let tree = TestTree::new();
        // Exactly one 1 KiB block, and a size that is not a block multiple.
        let sizes = [1024usize, 1500];
        let mut sources = Vec::new();
        let mut targets = Vec::new();
        for (i, size) in sizes.iter().enumerate() {
            let path = tree.source_root.join(format!("ragged-{i}"));
            std::fs::write(&path, seeded_payload(100 + i as u64, *size)).unwrap();
            sources.push(path);
            targets.push(tree.target_path(i));
        }

        let daemon = TestDaemon::spawn(3).await;
        let transfer = transfer_datasets(
            &daemon.server,
            datasets(&sources, DatasetKind::Parallel),
            datasets(&targets, DatasetKind::Posix),
        )
        .await
        .unwrap();

        assert!(transfer.wait().await.unwrap().done());
        for (i, (target, size)) in targets.iter().zip(&sizes).enumerate() {
            assert_eq!(read_file(target), seeded_payload(100 + i as u64, *size));
        }
        daemon.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn sequential_transfers_work_between_plain_backends() {
        let tree = TestTree::new();
        let sources = tree.populate_sources(3, 2048);
        let targets: Vec<_> = (0..3).map(|i| tree.target_path(i)).collect();

        let daemon = TestDaemon::spawn(2).await;
        let transfer = transfer_datasets(
            &daemon.server,
            datasets(&sources, DatasetKind::Posix),
            datasets(&targets, DatasetKind::Posix),
        )
        .await
        .unwrap();

        assert!(transfer.wait().await.unwrap().done());
        for (i, target) in targets.iter().enumerate() {
            assert_eq!(read_file(target), seeded_payload(i as u64, 2048));
        }
        daemon.shutdown().await;
    }
}
