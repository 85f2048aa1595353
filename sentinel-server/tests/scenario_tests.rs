// Sentinel Server - Scenario Tests
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Generated feeds replayed through the engine must raise exactly the
//! alert episodes their scenario declares.

use chrono::{Duration, TimeZone, Utc};
use hydro_sentinel::{feed, AlertKind, AlertTransition, FeedHealth, RawFields, SentinelEngine};
use sentinel_testdata::{generate_feed, Feed, FeedConfig, FeedScenario, LEAK, TDS_ANOMALY};
use std::thread;

fn generator(seed: u64) -> FeedConfig {
    FeedConfig::new().with_num_samples(100).with_seed(seed)
}

fn alert_kind(id: &str) -> AlertKind {
    match id {
        LEAK => AlertKind::Leak,
        TDS_ANOMALY => AlertKind::TdsAnomaly,
        other => panic!("unexpected alert id {}", other),
    }
}

/// Process a feed, stamping each snapshot with its sample time.
fn replay(generated: &Feed) -> (SentinelEngine, Vec<hydro_sentinel::DashboardView>) {
    let mut engine = SentinelEngine::default();
    let views = generated
        .samples
        .iter()
        .map(|sample| engine.process_at(&RawFields::from(sample.fields.clone()), sample.timestamp))
        .collect();
    (engine, views)
}

#[test]
fn test_every_scenario_matches_expected_episodes() {
    for scenario in FeedScenario::ALL {
        for seed in [1, 7, 42] {
            let generated = generate_feed(scenario, &generator(seed));
            let (_, views) = replay(&generated);

            for (index, view) in views.iter().enumerate() {
                for kind in [AlertKind::Leak, AlertKind::TdsAnomaly] {
                    let expected = generated.expects_active(kind.id(), index);
                    assert_eq!(
                        view.alert(kind).unwrap().is_active,
                        expected,
                        "{} seed {} sample {} alert {}",
                        scenario,
                        seed,
                        index,
                        kind.id()
                    );
                }
                assert!(!view.alert(AlertKind::HeavyMetal).unwrap().is_active);
            }
        }
    }
}

#[test]
fn test_episode_trigger_and_resolve_times() {
    for scenario in [FeedScenario::SlowLeak, FeedScenario::TdsSpike] {
        let generated = generate_feed(scenario, &generator(11));
        let (engine, views) = replay(&generated);
        let episode = &generated.expected[0];
        let kind = alert_kind(&episode.alert);
        let started = generated.samples[episode.start_sample].timestamp;

        for view in &views[episode.start_sample..episode.end_sample] {
            assert_eq!(view.alert(kind).unwrap().triggered_at, Some(started));
        }

        let events = engine.history().for_kind(kind);
        assert_eq!(events.len(), 2, "{}", scenario);
        assert_eq!(events[0].transition, AlertTransition::Raised);
        assert_eq!(events[0].at, started);
        assert_eq!(events[1].transition, AlertTransition::Resolved);
        assert_eq!(events[1].triggered_at, started);
        assert_eq!(
            events[1].at,
            generated.samples[episode.end_sample].timestamp
        );
    }
}

#[test]
fn test_noisy_feed_never_fails() {
    let generated = generate_feed(FeedScenario::NoisyFeed, &generator(3));
    let (engine, views) = replay(&generated);

    assert_eq!(engine.snapshot_count(), 100);
    for view in &views {
        assert_eq!(view.feed, FeedHealth::Live);
        assert!(view.readings.tds.value.unwrap() >= 0.0);
        assert!(view.readings.volume.value.unwrap() >= 0.0);
        assert_eq!(view.active_alerts, 0);
    }
    assert!(engine.history().is_empty());
}

#[test]
fn test_streamed_scenario_matches_direct_processing() {
    let generated = generate_feed(FeedScenario::SlowLeak, &generator(9));
    let (publisher, subscription) = feed();

    let rows: Vec<RawFields> = generated.fields().cloned().map(RawFields::from).collect();
    let producer = thread::spawn(move || {
        for raw in rows {
            publisher.publish(raw).unwrap();
        }
    });

    let start = Utc.with_ymd_and_hms(2025, 1, 10, 8, 0, 0).unwrap();
    let mut tick = 0;
    let mut active = Vec::new();
    let mut engine = SentinelEngine::default();
    let summary = engine.run_with_clock(
        &subscription,
        || {
            tick += 5;
            start + Duration::seconds(tick)
        },
        |view| active.push(view.alert(AlertKind::Leak).unwrap().is_active),
    );
    producer.join().unwrap();

    assert_eq!(summary.processed, 100);
    assert_eq!(summary.raised, 1);
    assert_eq!(summary.resolved, 1);
    let expected: Vec<bool> = (0..100).map(|i| generated.expects_active(LEAK, i)).collect();
    assert_eq!(active, expected);
}
