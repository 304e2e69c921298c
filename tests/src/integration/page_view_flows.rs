//! # Page View Flows
//!
//! ap-01 source → bus → ap-01 logger, with a chunk consumer on the same bus
//! to show the two streams do not interfere.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use ap_01_page_views::{PageViewConfig, PageViewLogger, PageViewSource};
    use ap_02_chunk_reassembly::{
        split_into_chunks, InMemorySink, ReassemblyApi, ReassemblyEngine, ReassemblyHandler,
    };
    use shared_bus::{EventFilter, EventPublisher, EventTopic, InMemoryEventBus, PipelineEvent};
    use tokio::sync::watch;

    #[tokio::test(start_paused = true)]
    async fn test_source_feeds_logger() {
        let bus = Arc::new(InMemoryEventBus::new());
        let config = PageViewConfig::default();
        let logger = PageViewLogger::new();
        let mut observed = bus.subscribe(EventFilter::topics(vec![EventTopic::PageViews]));
        let stream = bus.event_stream(EventFilter::topics(vec![EventTopic::PageViews]));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let logger_task = tokio::spawn(logger.clone().run(stream, shutdown_rx.clone()));
        let source = PageViewSource::new(&config, bus.clone()).unwrap().with_seed(9);
        let source_task = tokio::spawn(source.run(shutdown_rx));

        for _ in 0..5 {
            match observed.recv().await {
                Some(PipelineEvent::PageViewed { key, event }) => {
                    assert_eq!(key, event.user_id);
                    assert!(config.users.contains(&event.user_id));
                    assert!(config.pages.contains(&event.page));
                    assert!(event.duration == 10 || event.duration == 1000);
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }

        while logger.total() < 5 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        shutdown_tx.send(true).unwrap();
        source_task.await.unwrap();
        logger_task.await.unwrap();

        assert_eq!(logger.total(), 5);
        let counted: u64 = config.pages.iter().map(|page| logger.count(page)).sum();
        assert_eq!(counted, 5);
    }

    #[tokio::test]
    async fn test_page_views_do_not_touch_reassembly() {
        let bus = Arc::new(InMemoryEventBus::new());
        let sink = InMemorySink::new();
        let engine = ReassemblyEngine::new(sink.clone(), Default::default());
        let mut handler = ReassemblyHandler::new(engine, bus.clone());
        let logger = PageViewLogger::new();

        let chunks = split_into_chunks(b"interleaved with page views", 6).unwrap();
        let mut source = PageViewSource::new(&PageViewConfig::default(), bus.clone())
            .unwrap()
            .with_seed(3);

        for chunk in chunks {
            // A page view between every chunk, some keyed like the file.
            let view = source.publish_once().await;
            logger.handle(&view.user_id, &view);
            handler
                .handle_event(PipelineEvent::PageViewed {
                    key: "report".to_string(),
                    event: view,
                })
                .await;
            handler
                .handle_event(PipelineEvent::FileChunkReceived {
                    key: "report".to_string(),
                    chunk,
                })
                .await;
        }

        assert_eq!(
            sink.get("report.gz"),
            Some(b"interleaved with page views".to_vec())
        );
        assert_eq!(handler.engine().pending_keys(), 0);
        assert_eq!(logger.total(), 5);
        assert!(bus.events_published() >= 5);
    }
}
