//! End-to-end runs of the built-in scenarios.
//!
//! Each test runs a scenario in virtual time and checks the report against
//! what the pattern under test promises: unguarded views keep receiving
//! after destruction, guarded views receive nothing.

use lifeline_demo::app::{LifecycleEvent, Route};
use lifeline_demo::scenario::{self, RunnerConfig, ScenarioReport, parse_script};
use lifeline_runtime::{LeakSink, LeakSinkConfig, LeakSinkDestination};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use proptest::prelude::*;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::INFO)
        .try_init();
}

fn run_builtin(name: &str) -> ScenarioReport {
    init_tracing();
    let scenario = scenario::find(name).expect("built-in scenario");
    let config = RunnerConfig::default().with_failing_ids(scenario.failing_ids.iter().copied());
    scenario::run(name, &scenario.steps().expect("script"), &config).expect("run")
}

#[test]
fn dangling_call_delivers_into_destroyed_view() {
    let report = run_builtin("dangling-call");
    let bad = report.visit(Route::Bad).expect("bad visit");
    assert_eq!(bad.left_at_ms, Some(1000));
    assert_eq!(bad.stats.accepted, 0);
    assert_eq!(bad.stats.after_destroy, 1);
    // The stale state was mutated anyway.
    let fetch = bad.display.as_fetch().expect("fetch display");
    assert_eq!(fetch.user.as_ref().map(|u| u.id), Some(1));
    assert_eq!(report.post_destroy_deliveries, 1);
}

#[test]
fn guarded_call_is_cancelled_with_its_view() {
    let report = run_builtin("dangling-call-guarded");
    let good = report.visit(Route::Good).expect("good visit");
    assert_eq!(good.stats.accepted, 0);
    assert_eq!(good.stats.after_destroy, 0);
    assert!(good.display.as_fetch().expect("fetch display").user.is_none());
    assert_eq!(report.post_destroy_deliveries, 0);
    assert_eq!(report.pending_tasks, 0);
}

#[test]
fn interval_leak_keeps_ticking() {
    let report = run_builtin("interval-leak");
    let bad = report.visit(Route::IntervalBad).expect("interval-bad visit");
    assert_eq!(bad.stats.accepted, 2);
    assert_eq!(bad.stats.after_destroy, 3);
    assert_eq!(bad.display.as_interval().expect("interval display").counter, 5);
    assert_eq!(report.pending_tasks, 1);
}

#[test]
fn guarded_interval_stops_with_its_view() {
    let report = run_builtin("interval-guarded");
    let good = report.visit(Route::IntervalGood).expect("interval-good visit");
    assert_eq!(good.stats.accepted, 2);
    assert_eq!(good.stats.after_destroy, 0);
    let interval = good.display.as_interval().expect("interval display");
    assert_eq!(interval.counter, 2);
    assert!(!interval.running);
    assert_eq!(report.pending_tasks, 0);
}

#[test]
fn manual_stop_then_destroy() {
    let report = run_builtin("interval-manual-stop");
    let good = report.visit(Route::IntervalGood).expect("interval-good visit");
    assert_eq!(good.stats.accepted, 1);
    assert_eq!(good.stats.after_destroy, 0);
    assert_eq!(report.final_ms, 5500);
}

#[test]
fn fetch_error_then_next_user() {
    let report = run_builtin("fetch-error");
    let good = report.visit(Route::Good).expect("good visit");
    assert_eq!(good.stats.errors, 1);
    assert_eq!(good.stats.accepted, 1);
    let fetch = good.display.as_fetch().expect("fetch display");
    assert_eq!(fetch.user_id, 2);
    assert_eq!(fetch.user.as_ref().map(|u| u.name.as_str()), Some("Ervin Howell"));
}

#[test]
fn report_serializes_to_json() {
    let report = run_builtin("interval-leak");
    let json = serde_json::to_value(&report).expect("json");
    assert_eq!(json["scenario"], "interval-leak");
    assert_eq!(json["visits"][0]["route"], "interval-bad");
    assert_eq!(json["visits"][0]["stats"]["after_destroy"], 3);
    assert_eq!(json["lifecycle"][1]["event"], "destroyed");
}

#[test]
fn leak_evidence_is_written_as_jsonl() {
    init_tracing();
    let path = std::env::temp_dir().join(format!("lifeline_e2e_{}.jsonl", std::process::id()));
    let sink = LeakSink::open(&LeakSinkConfig::new(LeakSinkDestination::file(&path))).expect("open");
    let config = RunnerConfig::default().with_leak_sink(Some(sink));
    let steps = parse_script("nav:interval-bad,start,wait:1500,nav:good,wait:2000").expect("script");
    scenario::run("custom", &steps, &config).expect("run");

    let contents = std::fs::read_to_string(&path).expect("read");
    let records: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    let kinds: Vec<&str> = records.iter().filter_map(|r| r["kind"].as_str()).collect();
    assert_eq!(
        kinds,
        vec!["live_at_destroy", "post_destroy_delivery", "post_destroy_delivery"]
    );
    assert_eq!(records[1]["at_ms"], 2000);
    let _ = std::fs::remove_file(&path);
}

/// Writer that records into a shared buffer and notes when it is dropped.
struct TrackedWriter {
    buf: Arc<Mutex<Vec<u8>>>,
    dropped: Arc<AtomicBool>,
}

impl Write for TrackedWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().expect("buffer").extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for TrackedWriter {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

#[test]
fn run_tears_down_the_last_view_and_releases_the_sink() {
    init_tracing();
    let buf = Arc::new(Mutex::new(Vec::new()));
    let dropped = Arc::new(AtomicBool::new(false));
    let writer = TrackedWriter {
        buf: Arc::clone(&buf),
        dropped: Arc::clone(&dropped),
    };
    let config = RunnerConfig::default().with_leak_sink(Some(LeakSink::from_writer(Box::new(writer), false)));
    let steps = parse_script("nav:interval-bad,start,wait:1500").expect("script");
    let report = scenario::run("custom", &steps, &config).expect("run");

    assert_eq!(
        report.lifecycle,
        vec![
            LifecycleEvent::Created(Route::IntervalBad),
            LifecycleEvent::Destroyed(Route::IntervalBad),
        ]
    );
    let visit = report.visit(Route::IntervalBad).expect("visit");
    assert_eq!(visit.left_at_ms, Some(1500));
    // The detached ticker was still queued when the view went away.
    assert_eq!(report.pending_tasks, 1);

    // Everything the run created, the sink included, is released with the config.
    drop(config);
    assert!(dropped.load(Ordering::SeqCst));
    let written = String::from_utf8(buf.lock().expect("buffer").clone()).expect("utf8");
    let kinds: Vec<String> = written
        .lines()
        .map(|line| serde_json::from_str::<serde_json::Value>(line).expect("json line"))
        .filter_map(|record| record["kind"].as_str().map(str::to_string))
        .collect();
    assert_eq!(kinds, vec!["live_at_destroy"]);
}

#[test]
fn custom_latency_and_tick_period() {
    init_tracing();
    let config = RunnerConfig::default()
        .with_service(
            lifeline_demo::user_service::ServiceConfig::default()
                .with_latency(Duration::from_millis(100)),
        )
        .with_tick_period(Duration::from_millis(10));
    let steps = parse_script("nav:bad,load,wait:50,nav:interval-bad,start,wait:100").expect("script");
    let report = scenario::run("custom", &steps, &config).expect("run");
    assert_eq!(report.visit(Route::Bad).expect("bad").stats.after_destroy, 1);
    assert_eq!(report.visit(Route::IntervalBad).expect("interval").stats.accepted, 10);
}

// ── Properties ────────────────────────────────────────────────────────────

fn route_strategy() -> impl Strategy<Value = Route> {
    prop::sample::select(Route::ALL.to_vec())
}

proptest! {
    /// Every navigation destroys the outgoing view before creating the next.
    #[test]
    fn lifecycle_alternates(routes in proptest::collection::vec(route_strategy(), 1..12)) {
        let script: Vec<String> = routes
            .iter()
            .map(|route| format!("nav:{route},start,load,wait:700"))
            .collect();
        let steps = parse_script(&script.join(",")).expect("script");
        let report = scenario::run("prop", &steps, &RunnerConfig::default()).expect("run");

        let mut expected = Vec::new();
        for (idx, route) in routes.iter().enumerate() {
            if idx > 0 {
                expected.push(LifecycleEvent::Destroyed(routes[idx - 1]));
            }
            expected.push(LifecycleEvent::Created(*route));
        }
        expected.push(LifecycleEvent::Destroyed(routes[routes.len() - 1]));
        prop_assert_eq!(&report.lifecycle, &expected);
    }

    /// Guarded views never see a post-destroy delivery, whatever the timing.
    #[test]
    fn guarded_views_never_leak(
        waits in proptest::collection::vec(0u64..4_000, 1..8),
        interval in proptest::bool::ANY,
    ) {
        let (route, action) = if interval { ("interval-good", "start") } else { ("good", "load") };
        let script: Vec<String> = waits
            .iter()
            .map(|ms| format!("nav:{route},{action},wait:{ms}"))
            .collect();
        let steps = parse_script(&script.join(",")).expect("script");
        let report = scenario::run("prop", &steps, &RunnerConfig::default()).expect("run");
        prop_assert_eq!(report.post_destroy_deliveries, 0);
    }
}
