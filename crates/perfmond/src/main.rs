//! perfmond - Windows performance counter collector daemon.
//!
//! Samples the configured PDH counters on a fixed interval and writes one
//! JSON event per successful cycle to stdout.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use clap::Parser;
use serde::Serialize;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(not(windows))]
use perfmon_core::collector::MockPdh;
#[cfg(windows)]
use perfmon_core::collector::WindowsPdh;
use perfmon_core::collector::{Collector, PdhSubsystem, PerfmonError};
use perfmon_core::config::PerfmonConfig;
use perfmon_core::model::Snapshot;

/// Windows performance counter collector daemon.
#[derive(Parser, Debug)]
#[command(
    name = "perfmond",
    about = "Windows performance counter collector daemon",
    version
)]
struct Args {
    /// Path to the JSON counter configuration.
    #[arg(short, long, value_name = "PATH")]
    config: PathBuf,

    /// Collection interval in seconds.
    #[arg(short, long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// Collect a single snapshot and exit.
    #[arg(long)]
    once: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Logs go to stderr so that stdout carries only events.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = ["perfmond", "perfmon_core"]
        .iter()
        .fold(EnvFilter::from_default_env(), |filter, target| {
            match format!("{}={}", target, level).parse() {
                Ok(directive) => filter.add_directive(directive),
                Err(_) => filter,
            }
        });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Delay between the priming sample and the reported one in `--once` mode.
/// Rate counters need two samples before they can be formatted.
const ONCE_SETTLE: Duration = Duration::from_secs(1);

/// Event document written per cycle.
#[derive(Debug, Serialize)]
struct Event<'a> {
    #[serde(rename = "@timestamp")]
    timestamp: String,
    data: &'a Snapshot,
}

/// Wraps a snapshot into the event document written per cycle.
fn format_event(snapshot: &Snapshot, timestamp: DateTime<Utc>) -> Event<'_> {
    Event {
        timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        data: snapshot,
    }
}

/// Runs one cycle and writes its event. Returns `false` if the cycle failed.
fn emit<S: PdhSubsystem>(collector: &Collector<S>, cycle: u64) -> bool {
    match collector.collect_snapshot() {
        Ok(snapshot) => {
            let event = format_event(&snapshot, Utc::now());
            let mut stdout = std::io::stdout().lock();
            let written = serde_json::to_writer(&mut stdout, &event)
                .map_err(std::io::Error::from)
                .and_then(|_| writeln!(stdout))
                .and_then(|_| stdout.flush());
            if let Err(e) = written {
                error!("Failed to write event: {}", e);
                return false;
            }

            if let Some(timing) = collector.last_timing() {
                debug!(
                    "Cycle #{}: {} counters in {:?} (refresh {:?}, read-back {:?})",
                    cycle, timing.counters, timing.total, timing.refresh, timing.read_back
                );
            }
            true
        }
        Err(e) => {
            error!("Cycle #{} failed: {}", cycle, e);
            false
        }
    }
}

/// Takes a first sample whose values are discarded.
///
/// Counters that are not formattable yet are expected here; any other
/// failure is returned.
fn prime<S: PdhSubsystem>(
    collector: &Collector<S>,
    settle: Duration,
) -> Result<(), PerfmonError> {
    match collector.collect_snapshot() {
        Ok(_) => {}
        Err(e @ PerfmonError::Formatting { .. }) => {
            debug!("Priming sample incomplete: {}", e);
        }
        Err(e) => return Err(e),
    }
    std::thread::sleep(settle);
    Ok(())
}

fn run<S: PdhSubsystem>(
    args: &Args,
    config: &PerfmonConfig,
    subsystem: S,
    settle: Duration,
) -> ExitCode {
    let collector = match Collector::new(subsystem, &config.counters) {
        Ok(collector) => collector,
        Err(e) => {
            error!("Initialization failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.once {
        let ok = match prime(&collector, settle) {
            Ok(()) => emit(&collector, 1),
            Err(e) => {
                error!("Priming sample failed: {}", e);
                false
            }
        };
        if let Err(e) = collector.close() {
            warn!("Failed to close query: {}", e);
        }
        return if ok {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let interval = Duration::from_secs(args.interval);
    let mut cycle: u64 = 0;
    let mut failures: u64 = 0;

    info!("Starting collection loop");

    while running.load(Ordering::SeqCst) {
        cycle += 1;
        if !emit(&collector, cycle) {
            failures += 1;
        }

        // Sleep with periodic checks for shutdown signal
        let sleep_interval = Duration::from_millis(100);
        let mut remaining = interval;
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
    }

    info!("Shutting down after {} cycles ({} failed)", cycle, failures);
    if let Err(e) = collector.close() {
        error!("Failed to close query: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Shutdown complete");
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    info!("perfmond {} starting", env!("CARGO_PKG_VERSION"));

    let config = match PerfmonConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(
        "Config: {} entries from {}, interval={}s",
        config.counters.len(),
        args.config.display(),
        args.interval
    );

    #[cfg(windows)]
    let subsystem = WindowsPdh::new();
    #[cfg(not(windows))]
    let subsystem = {
        warn!("PDH is only available on Windows, using simulated counters");
        MockPdh::typical_system()
    };

    run(&args, &config, subsystem, ONCE_SETTLE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use perfmon_core::collector::mock::scenarios::{CPU_TOTAL, DISK_READS, DISK_WRITES};
    use perfmon_core::collector::{MockCall, MockPdh, PdhStatus};
    use perfmon_core::model::{CounterConfig, CounterSpec};

    fn once_args() -> Args {
        Args::try_parse_from(["perfmond", "--config", "c.json", "--once"]).unwrap()
    }

    fn config(counters: Vec<CounterSpec>) -> PerfmonConfig {
        PerfmonConfig { counters }
    }

    #[test]
    fn format_event_keeps_snapshot_order() {
        let snapshot = Snapshot::builder()
            .push_group(None, [("zeta", 1.0)])
            .push_group(Some("net"), [("sent", 2.0), ("recv", 3.0)])
            .push_group(None, [("alpha", 4.0)])
            .build();
        let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        assert_eq!(
            serde_json::to_string(&format_event(&snapshot, timestamp)).unwrap(),
            r#"{"@timestamp":"2024-05-01T12:00:00.000Z","data":{"zeta":1.0,"net":{"sent":2.0,"recv":3.0},"alpha":4.0}}"#
        );
    }

    #[test]
    fn format_event_wraps_snapshot_in_data() {
        let collector = Collector::new(
            MockPdh::typical_system(),
            &[
                CounterSpec::flat("cpu", CPU_TOTAL),
                CounterSpec::group(
                    "disk",
                    vec![
                        CounterConfig::new("writes", DISK_WRITES),
                        CounterConfig::new("reads", DISK_READS),
                    ],
                ),
            ],
        )
        .unwrap();
        let snapshot = collector.collect_snapshot().unwrap();
        let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        assert_eq!(
            serde_json::to_string(&format_event(&snapshot, timestamp)).unwrap(),
            r#"{"@timestamp":"2024-05-01T12:00:00.000Z","data":{"cpu":12.5,"disk":{"writes":20.0,"reads":10.0}}}"#
        );
    }

    #[test]
    fn emit_reports_failed_cycle() {
        let collector = Collector::new(
            MockPdh::stalled_system(),
            &[CounterSpec::flat("cpu", CPU_TOTAL)],
        )
        .unwrap();
        assert!(!emit(&collector, 1));
    }

    #[test]
    fn once_collects_and_closes_query() {
        let pdh = MockPdh::typical_system();
        let code = run(
            &once_args(),
            &config(vec![CounterSpec::flat("cpu", CPU_TOTAL)]),
            pdh.clone(),
            Duration::ZERO,
        );

        assert_eq!(code, ExitCode::SUCCESS);
        assert!(pdh.is_closed());
        let refreshes = pdh
            .calls()
            .iter()
            .filter(|call| **call == MockCall::CollectQueryData)
            .count();
        assert_eq!(refreshes, 2);
    }

    #[test]
    fn once_reports_rate_counter_after_priming() {
        let mut pdh = MockPdh::typical_system();
        pdh.mark_rate(CPU_TOTAL);
        let code = run(
            &once_args(),
            &config(vec![
                CounterSpec::flat("cpu", CPU_TOTAL),
                CounterSpec::flat("reads", DISK_READS),
            ]),
            pdh.clone(),
            Duration::ZERO,
        );

        assert_eq!(code, ExitCode::SUCCESS);
        assert!(pdh.is_closed());
    }

    #[test]
    fn once_fails_when_refresh_fails() {
        let pdh = MockPdh::stalled_system();
        let code = run(
            &once_args(),
            &config(vec![CounterSpec::flat("cpu", CPU_TOTAL)]),
            pdh.clone(),
            Duration::ZERO,
        );

        assert_eq!(code, ExitCode::FAILURE);
        assert!(pdh.is_closed());
    }

    #[test]
    fn registration_failure_exits_with_failure() {
        let mut pdh = MockPdh::typical_system();
        pdh.fail_add(DISK_READS, PdhStatus::CSTATUS_BAD_COUNTERNAME);
        let code = run(
            &once_args(),
            &config(vec![
                CounterSpec::flat("cpu", CPU_TOTAL),
                CounterSpec::flat("reads", DISK_READS),
            ]),
            pdh.clone(),
            Duration::ZERO,
        );

        assert_eq!(code, ExitCode::FAILURE);
        assert!(pdh.is_closed());
        assert!(!pdh.calls().contains(&MockCall::CollectQueryData));
    }

    #[test]
    fn args_require_config_and_positive_interval() {
        assert!(Args::try_parse_from(["perfmond"]).is_err());
        assert!(Args::try_parse_from(["perfmond", "-c", "c.json", "-i", "0"]).is_err());

        let args = Args::try_parse_from(["perfmond", "--config", "c.json", "--once", "-vv"])
            .unwrap();
        assert_eq!(args.config, PathBuf::from("c.json"));
        assert_eq!(args.interval, 10);
        assert!(args.once);
        assert_eq!(args.verbose, 2);
    }
}
