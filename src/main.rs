use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use rand::Rng;
use serde::Serialize;
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ratekeeper::config::{LimiterConfig, RatekeeperConfig};
use ratekeeper::ratelimit::{Limiter, RateLimiter};

/// Drive a synthetic load through a rate limiter and report its decisions.
#[derive(Parser, Debug)]
#[command(name = "ratekeeper", version, about)]
struct Args {
    /// YAML file describing limiters per resource
    #[arg(short, long, requires = "resource")]
    config: Option<String>,

    /// Resource from the config file to exercise
    #[arg(short, long, requires = "config")]
    resource: Option<String>,

    /// Algorithm to use when no config file is given
    #[arg(long, value_enum, default_value_t = Algorithm::FixedWindow)]
    algorithm: Algorithm,

    /// Threshold (fixed window) or capacity (leaky bucket) when no config file is given
    #[arg(long, default_value_t = 10)]
    threshold: u64,

    /// Window length or leak interval in milliseconds when no config file is given
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Number of concurrent callers
    #[arg(short, long, default_value_t = 4)]
    workers: usize,

    /// How long to run, in milliseconds
    #[arg(short, long, default_value_t = 3000)]
    duration_ms: u64,

    /// Pause between calls per worker, in milliseconds (plus up to 50% jitter)
    #[arg(short, long, default_value_t = 10)]
    pause_ms: u64,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Algorithm {
    FixedWindow,
    LeakyBucket,
}

#[derive(Debug, Serialize)]
struct Summary {
    algorithm: &'static str,
    workers: usize,
    duration_ms: u64,
    admitted: u64,
    rejected: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);
    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let limiter = Arc::new(build_limiter(&args)?);
    info!(algorithm = limiter.algorithm(), workers = args.workers, "Starting load");

    let admitted = Arc::new(AtomicU64::new(0));
    let rejected = Arc::new(AtomicU64::new(0));
    let deadline = Instant::now() + Duration::from_millis(args.duration_ms);

    let workers: Vec<_> = (0..args.workers)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            let admitted = Arc::clone(&admitted);
            let rejected = Arc::clone(&rejected);
            let pause_ms = args.pause_ms;
            tokio::spawn(async move {
                while Instant::now() < deadline {
                    if limiter.try_acquire() {
                        admitted.fetch_add(1, Ordering::Relaxed);
                    } else {
                        rejected.fetch_add(1, Ordering::Relaxed);
                    }
                    let jitter = rand::thread_rng().gen_range(0..=pause_ms / 2);
                    tokio::time::sleep(Duration::from_millis(pause_ms + jitter)).await;
                }
            })
        })
        .collect();

    for result in futures::future::join_all(workers).await {
        result.context("worker task failed")?;
    }

    let summary = Summary {
        algorithm: limiter.algorithm(),
        workers: args.workers,
        duration_ms: args.duration_ms,
        admitted: admitted.load(Ordering::Relaxed),
        rejected: rejected.load(Ordering::Relaxed),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "{}: {} admitted, {} rejected ({} workers, {}ms)",
            summary.algorithm,
            summary.admitted,
            summary.rejected,
            summary.workers,
            summary.duration_ms
        );
    }

    Ok(())
}

/// Build the limiter from the config file, or from the command line flags.
fn build_limiter(args: &Args) -> anyhow::Result<Limiter> {
    let config = match (&args.config, &args.resource) {
        (Some(path), Some(resource)) => {
            let config = RatekeeperConfig::from_file(path)?;
            config.resource(resource)?.clone()
        }
        (None, None) => match args.algorithm {
            Algorithm::FixedWindow => LimiterConfig::FixedWindow {
                threshold: args.threshold,
                window_ms: args.interval_ms,
            },
            Algorithm::LeakyBucket => LimiterConfig::LeakyBucket {
                capacity: args.threshold,
                leak_interval_ms: args.interval_ms,
                leak_per_interval: None,
            },
        },
        _ => anyhow::bail!("--config and --resource must be given together"),
    };
    Ok(config.build()?)
}
