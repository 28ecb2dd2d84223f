#![forbid(unsafe_code)]

//! Command-line argument parsing for the demo.
//!
//! Parses args manually to keep the binary lean. Supports environment
//! variable overrides via the `LIFELINE_DEMO_*` prefix; explicit flags win
//! over the environment, which wins over defaults.

use std::env;
use std::process;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_TEXT: &str = "\
Lifeline demo: dangling versus lifecycle-scoped subscriptions

USAGE:
    lifeline-demo [OPTIONS]

OPTIONS:
    --scenario=NAME      Run a built-in scenario (default: dangling-call)
    --script=STEPS       Run a custom script instead, e.g. nav:good,load,wait:3000
    --latency-ms=N       Simulated fetch latency in ms (default: 3000)
    --tick-ms=N          Interval period in ms (default: 1000)
    --speed=F            Wall-clock pacing factor, 0 = virtual time (default: 0)
    --json               Print the report as JSON
    --leak-jsonl=PATH    Write leak evidence as JSONL ('-' for stderr)
    --log-level=LEVEL    Log filter when RUST_LOG is unset (default: info)
    --log-json           Emit logs as JSON lines
    --list               List built-in scenarios and exit
    --help, -h           Show this help message
    --version, -V        Show version

SCRIPT STEPS:
    nav:ROUTE            Navigate to bad, good, interval-bad or interval-good
    load, load-next      Fetch the current / next user (fetch views)
    start, stop          Start / stop the ticker (interval views)
    wait:MS              Let MS milliseconds of virtual time pass

ENVIRONMENT VARIABLES:
    LIFELINE_DEMO_SCENARIO    Override --scenario
    LIFELINE_DEMO_SCRIPT      Override --script
    LIFELINE_DEMO_LATENCY_MS  Override --latency-ms
    LIFELINE_DEMO_TICK_MS     Override --tick-ms
    LIFELINE_DEMO_SPEED       Override --speed
    LIFELINE_DEMO_JSON        Enable --json (1/true)
    LIFELINE_DEMO_LEAK_JSONL  Override --leak-jsonl
    LIFELINE_DEMO_LOG_LEVEL   Override --log-level
    LIFELINE_DEMO_LOG_JSON    Enable --log-json (1/true)
    RUST_LOG                  Full tracing filter; takes precedence over --log-level";

/// Default scenario when neither a scenario nor a script is given.
pub const DEFAULT_SCENARIO: &str = "dangling-call";

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq)]
pub struct Opts {
    /// Built-in scenario name.
    pub scenario: String,
    /// Custom script; replaces the scenario when set.
    pub script: Option<String>,
    /// Simulated fetch latency in milliseconds.
    pub latency_ms: u64,
    /// Interval period in milliseconds.
    pub tick_ms: u64,
    /// Wall-clock pacing factor (0 = virtual time).
    pub speed: f64,
    /// Print the report as JSON.
    pub json: bool,
    /// Leak evidence JSONL destination.
    pub leak_jsonl: Option<String>,
    /// Log filter directive.
    pub log_level: String,
    /// JSON log lines.
    pub log_json: bool,
    /// List scenarios and exit.
    pub list: bool,
}

/// Why parsing stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Help,
    Version,
    InvalidValue { flag: &'static str, value: String },
    UnknownArg(String),
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            scenario: DEFAULT_SCENARIO.into(),
            script: None,
            latency_ms: 3000,
            tick_ms: 1000,
            speed: 0.0,
            json: false,
            leak_jsonl: None,
            log_level: "info".into(),
            log_json: false,
            list: false,
        }
    }
}

fn truthy(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}

fn parse_value<T: std::str::FromStr>(flag: &'static str, val: &str) -> Result<T, ParseError> {
    val.parse().map_err(|_| ParseError::InvalidValue {
        flag,
        value: val.to_string(),
    })
}

impl Opts {
    /// Parse command-line arguments and environment variables, exiting on
    /// `--help`, `--version` or invalid input.
    pub fn parse() -> Self {
        match Self::parse_from_env_and_args(env::args().skip(1), |key| env::var(key).ok()) {
            Ok(opts) => opts,
            Err(ParseError::Help) => {
                println!("{HELP_TEXT}");
                process::exit(0);
            }
            Err(ParseError::Version) => {
                println!("lifeline-demo {VERSION}");
                process::exit(0);
            }
            Err(ParseError::InvalidValue { flag, value }) => {
                eprintln!("Invalid {flag} value: {value}");
                process::exit(1);
            }
            Err(ParseError::UnknownArg(arg)) => {
                eprintln!("Unknown argument: {arg}");
                eprintln!("Run with --help for usage information.");
                process::exit(1);
            }
        }
    }

    pub fn parse_from_env_and_args<I, S, F>(args: I, get_env: F) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&str) -> Option<String>,
    {
        let mut opts = Self::default();

        // Environment first
        if let Some(val) = get_env("LIFELINE_DEMO_SCENARIO")
            && !val.trim().is_empty()
        {
            opts.scenario = val;
        }
        if let Some(val) = get_env("LIFELINE_DEMO_SCRIPT")
            && !val.trim().is_empty()
        {
            opts.script = Some(val);
        }
        if let Some(val) = get_env("LIFELINE_DEMO_LATENCY_MS")
            && let Ok(n) = val.parse()
        {
            opts.latency_ms = n;
        }
        if let Some(val) = get_env("LIFELINE_DEMO_TICK_MS")
            && let Ok(n) = val.parse()
        {
            opts.tick_ms = n;
        }
        if let Some(val) = get_env("LIFELINE_DEMO_SPEED")
            && let Ok(n) = val.parse()
        {
            opts.speed = n;
        }
        if let Some(val) = get_env("LIFELINE_DEMO_JSON") {
            opts.json = truthy(&val);
        }
        if let Some(val) = get_env("LIFELINE_DEMO_LEAK_JSONL")
            && !val.trim().is_empty()
        {
            opts.leak_jsonl = Some(val);
        }
        if let Some(val) = get_env("LIFELINE_DEMO_LOG_LEVEL")
            && !val.trim().is_empty()
        {
            opts.log_level = val;
        }
        if let Some(val) = get_env("LIFELINE_DEMO_LOG_JSON") {
            opts.log_json = truthy(&val);
        }

        // Flags override env vars
        for arg in args {
            let arg = arg.as_ref();
            match arg {
                "--help" | "-h" => return Err(ParseError::Help),
                "--version" | "-V" => return Err(ParseError::Version),
                "--json" => opts.json = true,
                "--log-json" => opts.log_json = true,
                "--list" => opts.list = true,
                other => {
                    if let Some(val) = other.strip_prefix("--scenario=") {
                        opts.scenario = val.to_string();
                    } else if let Some(val) = other.strip_prefix("--script=") {
                        opts.script = Some(val.to_string());
                    } else if let Some(val) = other.strip_prefix("--latency-ms=") {
                        opts.latency_ms = parse_value("--latency-ms", val)?;
                    } else if let Some(val) = other.strip_prefix("--tick-ms=") {
                        opts.tick_ms = parse_value("--tick-ms", val)?;
                    } else if let Some(val) = other.strip_prefix("--speed=") {
                        let speed: f64 = parse_value("--speed", val)?;
                        if !speed.is_finite() || speed < 0.0 {
                            return Err(ParseError::InvalidValue {
                                flag: "--speed",
                                value: val.to_string(),
                            });
                        }
                        opts.speed = speed;
                    } else if let Some(val) = other.strip_prefix("--leak-jsonl=") {
                        opts.leak_jsonl = Some(val.to_string());
                    } else if let Some(val) = other.strip_prefix("--log-level=") {
                        opts.log_level = val.to_string();
                    } else {
                        return Err(ParseError::UnknownArg(other.to_string()));
                    }
                }
            }
        }

        Ok(opts)
    }
}
