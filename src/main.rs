//! circuit-guard CLI.
//!
//! Validates breaker configuration and drives synthetic traffic through a
//! breaker to show how it trips, probes and recovers.
//!
//! # Architecture Overview
//!
//! ```text
//!   caller ──▶ Registry::get(name) ──▶ CircuitBreaker::run(work)
//!                                         │
//!                    ┌────────────────────┼────────────────────┐
//!                    ▼                    ▼                    ▼
//!               state.rs            timeouts.rs           window.rs
//!           (open / half-open)    (deadline on work)   (per-minute counts)
//!                                         │
//!                                         ▼
//!                                    Notifier ──▶ LoggingListener
//!                                             └─▶ MetricsListener
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use rand::Rng;
use serde::Serialize;
use tick::Clock;
use tokio::task::JoinSet;

use circuit_guard::config::{load_config, GuardConfig};
use circuit_guard::observability::logging::{init_logging, LoggingListener};
use circuit_guard::observability::metrics::{init_metrics, MetricsListener};
use circuit_guard::observability::notifier::Notifier;
use circuit_guard::resilience::window::WindowCounts;
use circuit_guard::{
    BreakerState, CallOutcome, CircuitBreaker, FailureClassifier, FailureReason, Registry,
};

#[derive(Parser)]
#[command(name = "circuit-guard")]
#[command(about = "Circuit breaker configuration and simulation tool", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and print the resolved breaker settings
    Check,
    /// Drive a synthetic flaky operation through a breaker
    Simulate {
        /// Breaker name (settings come from the config, else defaults).
        #[arg(long, default_value = "downstream")]
        breaker: String,

        /// Total number of calls.
        #[arg(long, default_value_t = 200)]
        calls: u32,

        /// Probability (0.0 - 1.0) that a call fails.
        #[arg(long, default_value_t = 0.3)]
        failure_rate: f64,

        /// Latency of a healthy call in milliseconds.
        #[arg(long, default_value_t = 5)]
        latency_ms: u64,

        /// Pause between calls of one worker in milliseconds.
        #[arg(long, default_value_t = 20)]
        interval_ms: u64,

        /// Number of concurrent workers sharing the breaker.
        #[arg(long, default_value_t = 4)]
        concurrency: u32,

        /// How failures manifest.
        #[arg(long, value_enum, default_value_t = FailureMode::Errors)]
        mode: FailureMode,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FailureMode {
    /// Failing calls return an error from the configured failure set.
    Errors,
    /// Failing calls hang past the breaker's timeout.
    Timeouts,
}

#[derive(Debug, thiserror::Error)]
#[error("simulated downstream failure")]
struct SimulatedFailure;

#[derive(Debug, Default, Serialize)]
struct Tally {
    succeeded: u64,
    failed: u64,
    timed_out: u64,
    rejected: u64,
}

impl Tally {
    fn add(&mut self, other: &Tally) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.timed_out += other.timed_out;
        self.rejected += other.rejected;
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    breaker: String,
    calls: u32,
    #[serde(flatten)]
    tally: Tally,
    final_state: BreakerState,
    window: WindowCounts,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };

    init_logging(&config.observability)?;

    match cli.command {
        Commands::Check => {
            let resolved: BTreeMap<_, _> = config
                .breakers
                .iter()
                .map(|b| (b.name.clone(), b.resolve(&config.defaults)))
                .collect();
            tracing::info!(breakers = resolved.len(), "Configuration is valid");
            println!("{}", serde_json::to_string_pretty(&resolved)?);
        }
        Commands::Simulate {
            breaker,
            calls,
            failure_rate,
            latency_ms,
            interval_ms,
            concurrency,
            mode,
        } => {
            if !(0.0..=1.0).contains(&failure_rate) {
                return Err(format!("failure rate {failure_rate} must be within 0.0..=1.0").into());
            }

            if config.observability.metrics_enabled {
                init_metrics(config.observability.metrics_address.parse()?)?;
            }

            let notifier = Arc::new(Notifier::new());
            notifier.subscribe(Arc::new(LoggingListener));
            notifier.subscribe(Arc::new(MetricsListener));

            let classifier = match mode {
                FailureMode::Errors => FailureClassifier::custom().kind::<SimulatedFailure>(),
                FailureMode::Timeouts => FailureClassifier::Default,
            };
            // Breakers named in the file are created here, so they need the
            // simulation classifier up front.
            let registry = Registry::from_config(&config, notifier, Clock::new_tokio(), |_| {
                classifier.clone()
            });
            let cb = registry.get_with_settings(&breaker, &config.settings_for(&breaker), classifier);

            tracing::info!(
                breaker = %cb.name(),
                calls,
                failure_rate,
                concurrency,
                ?mode,
                "Simulation starting"
            );

            let tally = simulate(
                cb.clone(),
                calls,
                concurrency.max(1),
                failure_rate,
                Duration::from_millis(latency_ms),
                Duration::from_millis(interval_ms),
                mode,
            )
            .await?;

            let summary = Summary {
                breaker: cb.name().to_string(),
                calls,
                tally,
                final_state: cb.state(),
                window: cb.counts(),
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

async fn simulate(
    cb: Arc<CircuitBreaker>,
    calls: u32,
    workers: u32,
    failure_rate: f64,
    latency: Duration,
    interval: Duration,
    mode: FailureMode,
) -> Result<Tally, Box<dyn std::error::Error>> {
    let mut tasks = JoinSet::new();

    for worker in 0..workers {
        let share = calls / workers + u32::from(worker < calls % workers);
        let cb = cb.clone();
        // Long enough to blow through any sane timeout.
        let hang = cb.config().timeout.saturating_mul(4);

        tasks.spawn(async move {
            let mut tally = Tally::default();
            for _ in 0..share {
                let fail = rand::thread_rng().gen_bool(failure_rate);
                let outcome = cb
                    .run(|| async move {
                        match (fail, mode) {
                            (false, _) => {
                                tokio::time::sleep(latency).await;
                                Ok(())
                            }
                            (true, FailureMode::Errors) => {
                                tokio::time::sleep(latency).await;
                                Err(SimulatedFailure)
                            }
                            (true, FailureMode::Timeouts) => {
                                tokio::time::sleep(hang).await;
                                Err(SimulatedFailure)
                            }
                        }
                    })
                    .await;

                match outcome {
                    Ok(CallOutcome::Success(())) => tally.succeeded += 1,
                    Ok(CallOutcome::Rejected) => tally.rejected += 1,
                    Ok(CallOutcome::Failed(FailureReason::Timeout(_))) => tally.timed_out += 1,
                    Ok(CallOutcome::Failed(FailureReason::Classified)) => tally.failed += 1,
                    Err(e) => {
                        tracing::error!(error = %e, "Unclassified failure escaped the breaker");
                        tally.failed += 1;
                    }
                }
                tokio::time::sleep(interval).await;
            }
            tally
        });
    }

    let mut total = Tally::default();
    while let Some(result) = tasks.join_next().await {
        total.add(&result?);
    }
    Ok(total)
}
