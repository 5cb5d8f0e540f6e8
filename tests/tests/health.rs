//! Health registry updates from the sink and metadata service.

use httpmock::prelude::*;
use influx_client::{InfluxConfig, InfluxSink, PointSink};
use integration_tests::fixtures::{metadata_body, raw_event, TENANT};
use integration_tests::setup::TestContext;
use telemetry::{health, HealthStatus};

/// One test so the global registry isn't mutated concurrently.
#[tokio::test]
async fn test_health_follows_components() {
    let influx = MockServer::start_async().await;
    let mut ping = influx
        .mock_async(|when, then| {
            when.method(GET).path("/ping");
            then.status(204);
        })
        .await;

    let sink = InfluxSink::new(InfluxConfig {
        url: influx.base_url(),
        ..Default::default()
    })
    .unwrap();

    assert!(sink.ping().await);
    assert!(health().influxdb.is_healthy());

    // A configured metadata service counts only once a request succeeds
    health().metadata.set_unhealthy("not contacted yet");
    let ctx = TestContext::with_metadata().await;
    ctx.metadata_server()
        .mock_async(|when, then| {
            when.method(GET).path(format!("/{}/events/ep-1", TENANT));
            then.status(200).body(metadata_body(Some("series-1")));
        })
        .await;
    let pipeline = ctx
        .pipeline("PT2H", Some(ctx.metadata_config("PT0M")), Default::default())
        .unwrap();
    assert_eq!(health().report().status, HealthStatus::Degraded);

    ctx.run(&pipeline, vec![raw_event("ep-1", "10.0.0.1", "10:00")])
        .await
        .unwrap();
    assert_eq!(health().report().status, HealthStatus::Healthy);

    ping.delete_async().await;
    influx
        .mock_async(|when, then| {
            when.method(GET).path("/ping");
            then.status(503);
        })
        .await;

    assert!(!sink.ping().await);
    let report = health().report();
    assert_eq!(report.status, HealthStatus::Unhealthy);
    assert!(report
        .components
        .iter()
        .any(|c| c.name == "influxdb" && c.message.is_some()));
}
