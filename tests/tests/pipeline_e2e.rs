//! End-to-end tests for the deduplication pipeline.
//!
//! Events flow through the real window fold, enricher (against a mock
//! metadata service), and batch writer into `MockSink`.

use engine_core::EventFilter;
use httpmock::prelude::*;
use integration_tests::fixtures::{self, access_log_line, metadata_body, raw_event, TENANT};
use integration_tests::setup::{small_buffers, TestContext};
use pipeline::{PipelineConfig, PipelineState};

#[tokio::test]
async fn test_repeated_views_counted_once_with_series() {
    let ctx = TestContext::with_metadata().await;
    let server = ctx.metadata_server();
    let ep1 = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/{}/events/ep-1", TENANT));
            then.status(200).body(metadata_body(Some("series-1")));
        })
        .await;
    let ep2 = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/{}/events/ep-2", TENANT));
            then.status(200).body(metadata_body(Some("series-2")));
        })
        .await;

    let pipeline = ctx
        .pipeline("PT2H", Some(ctx.metadata_config("PT10M")), small_buffers())
        .unwrap();
    let summary = ctx
        .run(
            &pipeline,
            vec![
                raw_event("ep-1", "10.0.0.1", "10:00"),
                raw_event("ep-2", "10.0.0.1", "10:01"),
                raw_event("ep-1", "10.0.0.1", "11:59"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(summary.events, 3);
    assert_eq!(summary.evictions, 2);
    assert_eq!(summary.records_written, 2);

    let mut records = ctx.sink.captured_records();
    records.sort_by(|a, b| a.subject_id.cmp(&b.subject_id));
    assert_eq!(records[0].series_id, "series-1");
    assert_eq!(records[0].timestamp, fixtures::at("11:59"));
    assert_eq!(records[1].series_id, "series-2");
    assert!(records.iter().all(|r| r.tenant_id == TENANT));

    ep1.assert_hits_async(1).await;
    ep2.assert_hits_async(1).await;
    assert_eq!(pipeline.state(), PipelineState::Terminated);
}

#[tokio::test]
async fn test_metadata_cache_shared_across_viewers() {
    let ctx = TestContext::with_metadata().await;
    let mock = ctx
        .metadata_server()
        .mock_async(|when, then| {
            when.method(GET).path(format!("/{}/events/ep-1", TENANT));
            then.status(200).body(metadata_body(Some("series-1")));
        })
        .await;

    let pipeline = ctx
        .pipeline("PT2H", Some(ctx.metadata_config("PT1H")), small_buffers())
        .unwrap();
    let events = (1..=5)
        .map(|n| raw_event("ep-1", &format!("10.0.0.{}", n), "10:00"))
        .collect();
    let summary = ctx.run(&pipeline, events).await.unwrap();

    assert_eq!(summary.records_written, 5);
    // Concurrent enrichments may race on the first miss
    let hits = mock.hits_async().await;
    assert!((1..=4).contains(&hits), "got {} requests", hits);
    assert!(ctx
        .sink
        .captured_records()
        .iter()
        .all(|r| r.series_id == "series-1"));
}

#[tokio::test]
async fn test_disabled_metadata_cache_requests_every_time() {
    let ctx = TestContext::with_metadata().await;
    let mock = ctx
        .metadata_server()
        .mock_async(|when, then| {
            when.method(GET).path(format!("/{}/events/ep-1", TENANT));
            then.status(200).body(metadata_body(Some("series-1")));
        })
        .await;

    let pipeline = ctx
        .pipeline(
            "PT30M",
            Some(ctx.metadata_config("PT0M")),
            PipelineConfig {
                enrichment_concurrency: 1,
                ..small_buffers()
            },
        )
        .unwrap();
    let events = ["10:00", "11:00", "12:00"]
        .iter()
        .map(|t| raw_event("ep-1", "10.0.0.1", t))
        .collect();
    ctx.run(&pipeline, events).await.unwrap();

    assert_eq!(ctx.sink.record_count(), 3);
    mock.assert_hits_async(3).await;
}

#[tokio::test]
async fn test_tenants_resolved_against_their_own_endpoint() {
    let ctx = TestContext::with_metadata().await;
    let server = ctx.metadata_server();
    let a = server
        .mock_async(|when, then| {
            when.method(GET).path("/org-a/events/ep-1");
            then.status(200).body(metadata_body(Some("a-series")));
        })
        .await;
    let b = server
        .mock_async(|when, then| {
            when.method(GET).path("/org-b/events/ep-1");
            then.status(200).body(metadata_body(Some("b-series")));
        })
        .await;

    let pipeline = ctx
        .pipeline("PT2H", Some(ctx.metadata_config("PT0M")), small_buffers())
        .unwrap();
    ctx.run(
        &pipeline,
        vec![
            fixtures::raw_event_for("org-a", "ep-1", "10.0.0.1", "10:00"),
            fixtures::raw_event_for("org-b", "ep-1", "10.0.0.1", "10:00"),
        ],
    )
    .await
    .unwrap();

    a.assert_async().await;
    b.assert_async().await;
    let mut series: Vec<String> = ctx
        .sink
        .captured_records()
        .into_iter()
        .map(|r| format!("{}:{}", r.tenant_id, r.series_id))
        .collect();
    series.sort();
    assert_eq!(series, vec!["org-a:a-series", "org-b:b-series"]);
}

#[tokio::test]
async fn test_optional_series_emits_empty() {
    let ctx = TestContext::with_metadata().await;
    ctx.metadata_server()
        .mock_async(|when, then| {
            when.method(GET).path(format!("/{}/events/ep-1", TENANT));
            then.status(200).body(metadata_body(None));
        })
        .await;

    let mut metadata = ctx.metadata_config("PT0M");
    metadata.series_are_optional = true;
    let pipeline = ctx.pipeline("PT2H", Some(metadata), small_buffers()).unwrap();
    ctx.run(&pipeline, vec![raw_event("ep-1", "10.0.0.1", "10:00")])
        .await
        .unwrap();

    assert_eq!(ctx.sink.captured_records()[0].series_id, "");
    assert_eq!(ctx.metrics.series_missing.get(), 0);
}

#[tokio::test]
async fn test_access_log_lines_filtered_before_window() {
    let ctx = TestContext::new();
    let pipeline = ctx.pipeline("PT2H", None, small_buffers()).unwrap();

    let mut bot = access_log_line("10.0.0.9", "ep-9", "10:05", 200);
    bot = bot.replace("Mozilla/5.0 (X11; Linux x86_64)", "Googlebot/2.1");
    let lines = vec![
        access_log_line("10.0.0.1", "ep-1", "10:00", 200),
        access_log_line("10.0.0.1", "ep-1", "10:30", 200),
        access_log_line("10.0.0.2", "ep-1", "10:31", 304),
        access_log_line("10.0.0.3", "ep-2", "10:32", 206),
        bot,
        "not an access log line\n".to_string(),
    ];
    let filter = EventFilter {
        invalid_user_agents: vec!["bot".to_string()],
        valid_file_extensions: vec![".mp4".to_string()],
        invalid_channels: vec![],
    };

    let summary = ctx.run_lines(&pipeline, &lines, &filter).await.unwrap();
    assert_eq!(summary.events, 3);
    assert_eq!(ctx.sink.subjects(), vec!["ep-1", "ep-2"]);
}

#[tokio::test]
async fn test_refresh_keeps_identity_in_window() {
    let ctx = TestContext::new();
    let pipeline = ctx.pipeline("PT1H", None, small_buffers()).unwrap();

    // x refreshed at 10:59, so y at 11:00 doesn't evict it
    let summary = ctx
        .run(
            &pipeline,
            vec![
                raw_event("x", "10.0.0.1", "10:00"),
                raw_event("x", "10.0.0.1", "10:59"),
                raw_event("y", "10.0.0.1", "11:00"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(summary.evictions, 2);
    assert_eq!(ctx.sink.subjects(), vec!["x", "y"]);
}

#[tokio::test]
async fn test_batches_respect_batch_size() {
    let ctx = TestContext::new();
    let pipeline = ctx
        .pipeline(
            "PT0S",
            None,
            PipelineConfig {
                batch_size: 3,
                flush_interval_ms: 60_000,
                ..small_buffers()
            },
        )
        .unwrap();

    let events = (0..10)
        .map(|n| raw_event(&format!("ep-{}", n), "10.0.0.1", "10:00"))
        .collect();
    let summary = ctx.run(&pipeline, events).await.unwrap();

    assert_eq!(summary.records_written, 10);
    assert_eq!(ctx.sink.batch_sizes(), vec![3, 3, 3, 1]);
    assert_eq!(ctx.metrics.sink_batches.get(), 4);
}
