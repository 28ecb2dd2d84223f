#![forbid(unsafe_code)]

//! Lifeline demo binary entry point.

use lifeline_demo::cli;
use lifeline_demo::logging;
use lifeline_demo::scenario::{self, RunnerConfig, Step};
use lifeline_demo::user_service::ServiceConfig;
use lifeline_runtime::{LeakSink, LeakSinkConfig, LeakSinkDestination};
use std::process;
use std::time::Duration;

fn main() {
    let opts = cli::Opts::parse();

    if opts.list {
        for scenario in scenario::BUILTIN {
            println!("{:<24} {}", scenario.name, scenario.description);
            println!("{:<24} {}", "", scenario.script);
        }
        return;
    }

    if let Err(err) = logging::init(&opts.log_level, opts.log_json) {
        eprintln!("{err}");
        process::exit(1);
    }

    let (name, steps, failing_ids) = match resolve(&opts) {
        Ok(resolved) => resolved,
        Err(msg) => {
            eprintln!("{msg}");
            process::exit(2);
        }
    };

    let leak_sink = match opts
        .leak_jsonl
        .as_deref()
        .map(|value| LeakSink::open(&LeakSinkConfig::new(LeakSinkDestination::parse(value))))
        .transpose()
    {
        Ok(sink) => sink,
        Err(err) => {
            eprintln!("Failed to open leak sink: {err}");
            process::exit(1);
        }
    };

    let config = RunnerConfig::default()
        .with_service(ServiceConfig::default().with_latency(Duration::from_millis(opts.latency_ms)))
        .with_tick_period(Duration::from_millis(opts.tick_ms))
        .with_speed(opts.speed)
        .with_failing_ids(failing_ids)
        .with_leak_sink(leak_sink);

    match scenario::run(&name, &steps, &config) {
        Ok(report) if opts.json => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                eprintln!("Failed to serialize report: {err}");
                process::exit(1);
            }
        },
        Ok(report) => println!("{report}"),
        Err(err) => {
            eprintln!("Scenario failed: {err}");
            process::exit(1);
        }
    }
}

/// Pick the script to run: an explicit script wins over a scenario name.
fn resolve(opts: &cli::Opts) -> Result<(String, Vec<Step>, Vec<u32>), String> {
    if let Some(script) = &opts.script {
        let steps = scenario::parse_script(script).map_err(|err| err.to_string())?;
        return Ok(("custom".to_string(), steps, Vec::new()));
    }
    let scenario = scenario::find(&opts.scenario).ok_or_else(|| {
        format!(
            "Unknown scenario: {} (run with --list to see the built-in ones)",
            opts.scenario
        )
    })?;
    let steps = scenario.steps().map_err(|err| err.to_string())?;
    Ok((scenario.name.to_string(), steps, scenario.failing_ids.to_vec()))
}
