//! The pipeline emits exactly what the window cache evicts.

use chrono::{Duration, TimeZone, Utc};
use engine_core::{EventIdentity, RawEvent, WindowCache};
use integration_tests::setup::{small_buffers, TestContext};
use proptest::prelude::*;

fn events() -> impl Strategy<Value = Vec<RawEvent>> {
    prop::collection::vec(("ep[a-d]", "10\\.0\\.0\\.[1-3]", 0i64..20_000), 0..40).prop_map(
        |raw| {
            let mut events: Vec<RawEvent> = raw
                .into_iter()
                .map(|(subject, ip, secs)| {
                    RawEvent::new(
                        EventIdentity::new(subject, "org", ip),
                        "engage-player",
                        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
                        "",
                    )
                })
                .collect();
            events.sort_by_key(|e| e.timestamp);
            events
        },
    )
}

/// (subject, timestamp) of every eviction, sorted.
fn fold(events: &[RawEvent], window: Duration) -> Vec<(String, i64)> {
    let mut cache = WindowCache::empty();
    let mut out = Vec::new();
    for event in events {
        cache = cache.advance(event.clone(), window);
        out.extend(cache.take_evictions());
    }
    out.extend(cache.close().take_evictions());

    let mut keys: Vec<_> = out
        .into_iter()
        .map(|e| (e.identity.subject_id, e.timestamp.timestamp()))
        .collect();
    keys.sort();
    keys
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_pipeline_matches_window_fold(events in events(), minutes in 0i64..240) {
        let window = Duration::minutes(minutes);
        let expected = fold(&events, window);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let ctx = TestContext::new();
        let records = runtime.block_on(async {
            let pipeline = ctx
                .pipeline(&format!("PT{}M", minutes), None, small_buffers())
                .unwrap();
            ctx.run(&pipeline, events).await.unwrap();
            ctx.sink.captured_records()
        });

        let mut actual: Vec<_> = records
            .into_iter()
            .map(|r| (r.subject_id, r.timestamp.timestamp()))
            .collect();
        actual.sort();

        prop_assert_eq!(actual, expected);
    }
}
