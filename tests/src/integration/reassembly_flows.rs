//! # Chunk Reassembly Flows
//!
//! Producer → bus → ap-02 handler/workers → filesystem.
//!
//! ## Flows Tested
//!
//! 1. **JSON wire path**: chunks serialized, parsed back, published, written to disk
//! 2. **Ordering**: 1,3,2,4 is rejected and nothing is written; a clean resend succeeds
//! 3. **Decode isolation**: a bad payload is dropped and the file still completes
//! 4. **Key isolation**: interleaved keys across partitioned workers
//! 5. **Key reuse and restarts**: consecutive files under one key

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use ap_02_chunk_reassembly::{
        split_into_chunks, FileSystemSink, PartitionedReassembly, ReassemblyConfig,
        ReassemblyEngine, ReassemblyHandler, SystemTimeSource,
    };
    use sha2::{Digest, Sha256};
    use shared_bus::{
        EventFilter, EventPublisher, EventTopic, InMemoryEventBus, PipelineEvent, Subscription,
    };
    use shared_types::{ArtifactDescriptor, FileChunkMessage};
    use tempfile::TempDir;
    use tokio::sync::watch;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct Pipeline {
        bus: Arc<InMemoryEventBus>,
        artifacts: Subscription,
        dir: TempDir,
        shutdown: watch::Sender<bool>,
        task: JoinHandle<()>,
    }

    /// Reassembly over a fresh temp directory, one handler or `workers` partitions.
    fn start_pipeline(workers: usize) -> Pipeline {
        let dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(InMemoryEventBus::new());
        let sink = Arc::new(FileSystemSink::open(dir.path()).unwrap());
        let config = ReassemblyConfig {
            worker_count: workers,
            ..Default::default()
        };
        let (shutdown, shutdown_rx) = watch::channel(false);

        let chunks = bus.subscribe(EventFilter::topics(vec![EventTopic::FileChunks]));
        let artifacts = bus.subscribe(EventFilter::topics(vec![EventTopic::Artifacts]));

        let task = if workers > 1 {
            let partitioned = PartitionedReassembly::spawn(
                config,
                sink,
                SystemTimeSource,
                bus.clone(),
                shutdown_rx.clone(),
            );
            tokio::spawn(partitioned.run(chunks, shutdown_rx))
        } else {
            let handler = ReassemblyHandler::new(ReassemblyEngine::new(sink, config), bus.clone());
            tokio::spawn(handler.run(chunks, shutdown_rx))
        };

        Pipeline {
            bus,
            artifacts,
            dir,
            shutdown,
            task,
        }
    }

    impl Pipeline {
        async fn send(&self, key: &str, chunk: FileChunkMessage) {
            self.bus
                .publish(PipelineEvent::FileChunkReceived {
                    key: key.to_string(),
                    chunk,
                })
                .await;
        }

        async fn next_artifact_event(&mut self) -> PipelineEvent {
            timeout(Duration::from_secs(2), self.artifacts.recv())
                .await
                .expect("timed out waiting for artifact event")
                .expect("bus closed")
        }

        async fn expect_written(&mut self) -> ArtifactDescriptor {
            match self.next_artifact_event().await {
                PipelineEvent::ArtifactWritten(descriptor) => descriptor,
                other => panic!("expected ArtifactWritten, got {other:?}"),
            }
        }

        async fn expect_aborted(&mut self, expected_key: &str) {
            match self.next_artifact_event().await {
                PipelineEvent::ReassemblyAborted { key, .. } => assert_eq!(key, expected_key),
                other => panic!("expected ReassemblyAborted, got {other:?}"),
            }
        }

        fn read(&self, name: &str) -> Option<Vec<u8>> {
            std::fs::read(self.dir.path().join(name)).ok()
        }

        async fn stop(self) {
            self.shutdown.send(true).unwrap();
            timeout(Duration::from_secs(2), self.task)
                .await
                .unwrap()
                .unwrap();
        }
    }

    fn sample_bytes() -> Vec<u8> {
        (0..=255u8).collect()
    }

    fn artifact_exists(dir: &Path, name: &str) -> bool {
        dir.join(name).exists()
    }

    // =============================================================================
    // FLOWS
    // =============================================================================

    #[tokio::test]
    async fn test_json_wire_to_filesystem() {
        let mut pipeline = start_pipeline(1);
        let data = sample_bytes();

        for chunk in split_into_chunks(&data, 64).unwrap() {
            let wire = chunk.to_json().unwrap();
            let parsed = FileChunkMessage::from_json(&wire).unwrap();
            pipeline.send("bytes", parsed).await;
        }

        let descriptor = pipeline.expect_written().await;
        assert_eq!(descriptor.key, "bytes");
        assert_eq!(descriptor.name, "bytes.gz");
        assert_eq!(descriptor.size, 256);
        assert_eq!(descriptor.sha256, hex::encode(Sha256::digest(&data)));
        assert_eq!(pipeline.read("bytes.gz"), Some(data));

        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_out_of_order_rejected_then_resend() {
        let mut pipeline = start_pipeline(1);
        let data = sample_bytes();
        let chunks = split_into_chunks(&data, 64).unwrap();

        for index in [0, 2, 1, 3] {
            pipeline.send("bytes", chunks[index].clone()).await;
        }
        // Chunk 1 is accepted; 3, 2 and 4 each break the sequence.
        for _ in 0..3 {
            pipeline.expect_aborted("bytes").await;
        }
        assert!(!artifact_exists(pipeline.dir.path(), "bytes.gz"));

        for chunk in chunks {
            pipeline.send("bytes", chunk).await;
        }
        pipeline.expect_written().await;
        assert_eq!(pipeline.read("bytes.gz"), Some(data));

        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_bad_payload_dropped_file_completes() {
        let mut pipeline = start_pipeline(1);
        let data = b"the quick brown fox jumps over the lazy dog".to_vec();
        let chunks = split_into_chunks(&data, 10).unwrap();
        let total = chunks.len() as u32;

        pipeline.send("fox", chunks[0].clone()).await;
        pipeline
            .send("fox", FileChunkMessage::new(2, total, "not base64!"))
            .await;
        for chunk in &chunks[1..] {
            pipeline.send("fox", chunk.clone()).await;
        }

        // No abort: the bad chunk leaves the key untouched.
        let descriptor = pipeline.expect_written().await;
        assert_eq!(descriptor.key, "fox");
        assert_eq!(pipeline.read("fox.gz"), Some(data));

        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_interleaved_keys_across_workers() {
        let mut pipeline = start_pipeline(4);
        let files: Vec<(String, Vec<u8>)> = (0..6)
            .map(|i| (format!("file-{i}"), vec![b'a' + i as u8; 200 + i * 31]))
            .collect();
        let split: Vec<Vec<FileChunkMessage>> = files
            .iter()
            .map(|(_, data)| split_into_chunks(data, 32).unwrap())
            .collect();

        let longest = split.iter().map(Vec::len).max().unwrap_or(0);
        for round in 0..longest {
            for (index, chunks) in split.iter().enumerate() {
                if let Some(chunk) = chunks.get(round) {
                    pipeline.send(&files[index].0, chunk.clone()).await;
                }
            }
        }

        let mut written = Vec::new();
        for _ in 0..files.len() {
            written.push(pipeline.expect_written().await.key);
        }
        written.sort();
        assert_eq!(
            written,
            files.iter().map(|(key, _)| key.clone()).collect::<Vec<_>>()
        );
        for (key, data) in &files {
            assert_eq!(pipeline.read(&format!("{key}.gz")).as_ref(), Some(data));
        }

        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_key_reuse_replaces_artifact() {
        let mut pipeline = start_pipeline(1);

        for chunk in split_into_chunks(b"monday's report, rather long", 8).unwrap() {
            pipeline.send("daily", chunk).await;
        }
        pipeline.expect_written().await;

        for chunk in split_into_chunks(b"tuesday", 4).unwrap() {
            pipeline.send("daily", chunk).await;
        }
        pipeline.expect_written().await;

        assert_eq!(pipeline.read("daily.gz"), Some(b"tuesday".to_vec()));
        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_single_chunk_restarts_partial_file() {
        let mut pipeline = start_pipeline(1);
        let chunks = split_into_chunks(b"abandoned half file", 7).unwrap();

        pipeline.send("doc", chunks[0].clone()).await;
        pipeline.send("doc", chunks[1].clone()).await;
        pipeline
            .send("doc", split_into_chunks(b"fresh", 64).unwrap().remove(0))
            .await;

        pipeline.expect_aborted("doc").await;
        pipeline.expect_written().await;
        assert_eq!(pipeline.read("doc.gz"), Some(b"fresh".to_vec()));

        pipeline.stop().await;
    }
}
