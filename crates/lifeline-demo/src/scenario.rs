#![forbid(unsafe_code)]

//! Scripted scenarios.
//!
//! A script is a comma-separated list of steps:
//!
//! | Step | Meaning |
//! |------|---------|
//! | `nav:ROUTE` | navigate (`nav:` alone redirects to `bad`) |
//! | `load`, `load-next`, `start`, `stop` | dispatch to the current view |
//! | `wait:MS` | let the event queue run for `MS` milliseconds |
//!
//! Scenarios run in virtual time by default. With a positive speed, each
//! wait is paced against the wall clock (`speed = 2.0` runs twice as fast as
//! real time) so the log output can be watched as it happens.

use crate::app::{App, LifecycleEvent, Route};
use crate::user_service::{FetchError, FixtureBackend, ServiceConfig, UserService};
use crate::view::{Action, DEFAULT_TICK_PERIOD, DisplayState, StatsSnapshot, ViewContext};
use lifeline_runtime::{EventQueue, LeakSink};
use serde::Serialize;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tracing::{info, info_span};

/// One scripted step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Navigate(Route),
    Dispatch(Action),
    Wait(Duration),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Navigate(route) => write!(f, "nav:{route}"),
            Self::Dispatch(action) => write!(f, "{action}"),
            Self::Wait(duration) => write!(f, "wait:{}", duration.as_millis()),
        }
    }
}

/// A step that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    pub step: String,
    pub reason: &'static str,
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid step {:?}: {}", self.step, self.reason)
    }
}

impl std::error::Error for ScriptError {}

impl Step {
    pub fn parse(raw: &str) -> Result<Self, ScriptError> {
        let step = raw.trim();
        let fail = |reason| ScriptError {
            step: step.to_string(),
            reason,
        };
        if let Some(path) = step.strip_prefix("nav:") {
            return Route::parse(path)
                .map(Self::Navigate)
                .ok_or_else(|| fail("unknown route"));
        }
        if let Some(ms) = step.strip_prefix("wait:") {
            return ms
                .trim()
                .parse()
                .map(|ms| Self::Wait(Duration::from_millis(ms)))
                .map_err(|_| fail("wait needs a number of milliseconds"));
        }
        step.parse::<Action>()
            .map(Self::Dispatch)
            .map_err(|()| fail("unknown step"))
    }
}

/// Parse a comma-separated script. Empty segments are skipped.
pub fn parse_script(script: &str) -> Result<Vec<Step>, ScriptError> {
    script
        .split(',')
        .filter(|segment| !segment.trim().is_empty())
        .map(Step::parse)
        .collect()
}

/// A named, built-in script.
#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub script: &'static str,
    /// User ids whose requests fail with a transport error.
    pub failing_ids: &'static [u32],
}

impl Scenario {
    pub fn steps(&self) -> Result<Vec<Step>, ScriptError> {
        parse_script(self.script)
    }
}

pub const BUILTIN: &[Scenario] = &[
    Scenario {
        name: "dangling-call",
        description: "Unguarded fetch answers after its view is gone",
        script: "nav:bad,load,wait:1000,nav:good,wait:3000",
        failing_ids: &[],
    },
    Scenario {
        name: "dangling-call-guarded",
        description: "Guarded fetch is cancelled when its view is destroyed",
        script: "nav:good,load,wait:1000,nav:bad,wait:3000",
        failing_ids: &[],
    },
    Scenario {
        name: "interval-leak",
        description: "Unguarded interval keeps ticking after its view is gone",
        script: "nav:interval-bad,start,wait:2500,nav:good,wait:3000",
        failing_ids: &[],
    },
    Scenario {
        name: "interval-guarded",
        description: "Guarded interval stops with its view",
        script: "nav:interval-good,start,wait:2500,nav:good,wait:3000",
        failing_ids: &[],
    },
    Scenario {
        name: "interval-manual-stop",
        description: "Manual stop before destruction; destruction is then a no-op",
        script: "nav:interval-good,start,wait:1500,stop,wait:2000,nav:bad,wait:2000",
        failing_ids: &[],
    },
    Scenario {
        name: "fetch-error",
        description: "Failed fetch keeps the view usable; the next user loads",
        script: "nav:good,load,wait:3000,load-next,wait:3000",
        failing_ids: &[1],
    },
];

/// Look up a built-in scenario by name.
#[must_use]
pub fn find(name: &str) -> Option<&'static Scenario> {
    BUILTIN.iter().find(|scenario| scenario.name == name)
}

/// Runner configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub service: ServiceConfig,
    pub tick_period: Duration,
    /// Wall-clock pacing factor. `0.0` runs in pure virtual time.
    pub speed: f64,
    pub failing_ids: Vec<u32>,
    pub leak_sink: Option<LeakSink>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            tick_period: DEFAULT_TICK_PERIOD,
            speed: 0.0,
            failing_ids: Vec::new(),
            leak_sink: None,
        }
    }
}

impl RunnerConfig {
    #[must_use]
    pub fn with_service(mut self, service: ServiceConfig) -> Self {
        self.service = service;
        self
    }

    #[must_use]
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    #[must_use]
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = if speed.is_finite() { speed.max(0.0) } else { 0.0 };
        self
    }

    #[must_use]
    pub fn with_failing_ids(mut self, ids: impl IntoIterator<Item = u32>) -> Self {
        self.failing_ids.extend(ids);
        self
    }

    #[must_use]
    pub fn with_leak_sink(mut self, sink: Option<LeakSink>) -> Self {
        self.leak_sink = sink;
        self
    }
}

/// Outcome of one visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisitReport {
    pub route: Route,
    pub entered_at_ms: u64,
    pub left_at_ms: Option<u64>,
    pub stats: StatsSnapshot,
    pub display: DisplayState,
    pub display_updates: u64,
}

/// Outcome of one scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub steps: usize,
    pub final_ms: u64,
    pub visits: Vec<VisitReport>,
    pub lifecycle: Vec<LifecycleEvent>,
    /// Callbacks that ran after their view was destroyed, over all visits.
    pub post_destroy_deliveries: u64,
    /// Tasks still queued once the last view was destroyed. They are
    /// dropped without running when the run ends.
    pub pending_tasks: usize,
}

impl ScenarioReport {
    /// Report for the first visit to `route`.
    #[must_use]
    pub fn visit(&self, route: Route) -> Option<&VisitReport> {
        self.visits.iter().find(|visit| visit.route == route)
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "scenario {} ({} steps, {} ms virtual)",
            self.scenario, self.steps, self.final_ms
        )?;
        for visit in &self.visits {
            let left = visit
                .left_at_ms
                .map_or_else(|| "open".to_string(), |ms| format!("{ms} ms"));
            writeln!(
                f,
                "  {:<14} {:>6} ms -> {:<8} accepted={} after_destroy={} errors={}",
                visit.route.path(),
                visit.entered_at_ms,
                left,
                visit.stats.accepted,
                visit.stats.after_destroy,
                visit.stats.errors,
            )?;
        }
        write!(
            f,
            "post-destroy deliveries: {}, pending tasks: {}",
            self.post_destroy_deliveries, self.pending_tasks
        )
    }
}

/// Run `steps` against a fresh queue, service and router.
///
/// The last view is destroyed before the report is taken, and whatever is
/// still queued afterwards is discarded. Detached tickers hold their view's
/// context, which holds the queue, so they would otherwise keep the whole
/// run alive.
pub fn run(name: &str, steps: &[Step], config: &RunnerConfig) -> Result<ScenarioReport, FetchError> {
    let _span = info_span!("scenario", name).entered();
    let queue = EventQueue::new();
    let backend = FixtureBackend::load()?.with_failing(config.failing_ids.iter().copied());
    let service = UserService::new(&queue, Rc::new(backend), config.service.clone());
    let ctx = ViewContext::new(&queue, service)
        .with_tick_period(config.tick_period)
        .with_leak_sink(config.leak_sink.clone());
    let mut app = App::new(ctx);

    for step in steps {
        info!(at_ms = app.context().now_ms(), %step, "step");
        match *step {
            Step::Navigate(route) => app.navigate(route),
            Step::Dispatch(action) => {
                app.dispatch(action);
            }
            Step::Wait(duration) => wait(&queue, duration, config.speed),
        }
    }
    app.close();

    let visits: Vec<VisitReport> = app
        .history()
        .iter()
        .map(|visit| VisitReport {
            route: visit.route,
            entered_at_ms: visit.entered_at_ms,
            left_at_ms: visit.left_at_ms,
            stats: visit.snapshot(),
            display: visit.display.get(),
            display_updates: visit.display_updates(),
        })
        .collect();
    let report = ScenarioReport {
        scenario: name.to_string(),
        steps: steps.len(),
        final_ms: app.context().now_ms(),
        post_destroy_deliveries: visits.iter().map(|v| v.stats.after_destroy).sum(),
        lifecycle: app.lifecycle().to_vec(),
        visits,
        pending_tasks: queue.pending(),
    };
    if let Some(sink) = &config.leak_sink
        && let Err(err) = sink.flush()
    {
        tracing::warn!(error = %err, "failed to flush leak sink");
    }
    let discarded = queue.clear();
    if discarded > 0 {
        tracing::debug!(discarded, "dropped tasks left on the queue");
    }
    info!(
        post_destroy_deliveries = report.post_destroy_deliveries,
        pending_tasks = report.pending_tasks,
        "scenario finished"
    );
    Ok(report)
}

/// Let `duration` of virtual time pass, optionally paced by the wall clock.
fn wait(queue: &EventQueue, duration: Duration, speed: f64) {
    let target = queue.now().saturating_add(duration);
    if speed <= 0.0 {
        queue.advance_to(target);
        return;
    }
    while let Some(due) = queue.next_due().filter(|due| *due <= target) {
        std::thread::sleep(scaled(due.saturating_sub(queue.now()), speed));
        queue.advance_to(due);
    }
    std::thread::sleep(scaled(target.saturating_sub(queue.now()), speed));
    queue.advance_to(target);
}

fn scaled(virtual_time: Duration, speed: f64) -> Duration {
    Duration::try_from_secs_f64(virtual_time.as_secs_f64() / speed).unwrap_or(virtual_time)
}
