//! credprobe binary entry point

mod input;
mod sink;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use probe_engine::{
    DelayRange, MarkerPredicate, RegexPredicate, ResultSink, RunConfig, SuccessPredicate,
    WorkerPool,
};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sink::{ConsoleSink, FanoutSink, FileSink, JsonlSink, SummarySink};

/// credprobe - concurrent credential tester for form logins
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Login form URL to post credentials against
    #[arg(long)]
    url: String,

    /// Usernames to try, comma-separated
    #[arg(long, conflicts_with = "username_file")]
    usernames: Option<String>,

    /// File with one username per line
    #[arg(long)]
    username_file: Option<PathBuf>,

    /// Passwords to try, comma-separated
    #[arg(long, conflicts_with = "password_file")]
    passwords: Option<String>,

    /// File with one password per line
    #[arg(long)]
    password_file: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Proxy URLs to rotate through, comma-separated
    #[arg(long, conflicts_with = "proxy_file")]
    proxies: Option<String>,

    /// File with one proxy URL per line
    #[arg(long)]
    proxy_file: Option<PathBuf>,

    /// Pause per worker between attempts, in seconds as "min-max"
    #[arg(long, default_value = "0-0")]
    delay: String,

    /// Response body substring that marks a successful login
    #[arg(long, default_value = probe_engine::DEFAULT_SUCCESS_MARKER)]
    success_marker: String,

    /// Response body regex that marks a successful login
    #[arg(long, conflicts_with = "success_marker")]
    success_regex: Option<String>,

    /// Append timestamped attempt lines to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Append one JSON record per attempt to this file
    #[arg(long)]
    json_log: Option<PathBuf>,
}

async fn resolve_required(
    inline: Option<String>,
    file: Option<PathBuf>,
    flag: &str,
) -> Result<Vec<String>> {
    match (inline, file) {
        (Some(raw), _) => Ok(input::parse_list(&raw)),
        (None, Some(path)) => input::load_wordlist(&path).await,
        (None, None) => bail!("either --{} or --{}-file is required", flag, flag),
    }
}

async fn resolve_optional(inline: Option<String>, file: Option<PathBuf>) -> Result<Vec<String>> {
    match (inline, file) {
        (Some(raw), _) => Ok(input::parse_list(&raw)),
        (None, Some(path)) => input::load_wordlist(&path).await,
        (None, None) => Ok(Vec::new()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging with proper configuration
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "probe_engine=info,probe_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let usernames = resolve_required(
        args.usernames.clone(),
        args.username_file.clone(),
        "usernames",
    )
    .await?;
    let passwords = resolve_required(
        args.passwords.clone(),
        args.password_file.clone(),
        "passwords",
    )
    .await?;
    let proxies = resolve_optional(args.proxies.clone(), args.proxy_file.clone()).await?;

    let delay: DelayRange = args.delay.parse().context("invalid --delay")?;

    let predicate: Arc<dyn SuccessPredicate> = match &args.success_regex {
        Some(pattern) => Arc::new(RegexPredicate::new(pattern)?),
        None => Arc::new(MarkerPredicate::new(args.success_marker.clone())),
    };

    let summary = Arc::new(SummarySink::new());
    let mut sinks: Vec<Arc<dyn ResultSink>> = vec![Arc::new(ConsoleSink), summary.clone()];
    if let Some(path) = &args.log_file {
        sinks.push(Arc::new(FileSink::create(path).await?));
    }
    if let Some(path) = &args.json_log {
        sinks.push(Arc::new(JsonlSink::create(path).await?));
    }

    let config = RunConfig::new(args.url.clone(), usernames, passwords)
        .with_workers(args.workers)
        .with_proxies(proxies.clone())
        .with_delay(delay);
    let total = config.total_attempts();

    println!("🚀 credprobe starting...");
    println!("🎯 Target: {}", args.url);
    println!(
        "🔑 {} usernames x {} passwords = {} attempts",
        config.usernames.len(),
        config.passwords.len(),
        total
    );
    println!(
        "⚙️  Workers: {}, delay {}-{}s between attempts",
        args.workers, delay.min_secs, delay.max_secs
    );
    if !proxies.is_empty() {
        println!("🔀 Rotating through {} proxies", proxies.len());
    }
    println!();

    let pool = WorkerPool::new(Arc::new(FanoutSink::new(sinks)));

    let mut progress_rx = pool.subscribe_progress();
    tokio::spawn(async move {
        loop {
            match progress_rx.recv().await {
                Ok(snapshot) => {
                    debug!(
                        completed = snapshot.completed,
                        succeeded = snapshot.succeeded,
                        failed = snapshot.failed,
                        total = snapshot.total,
                        "progress"
                    );
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let started = Instant::now();
    pool.start(config, predicate).await?;

    tokio::select! {
        _ = pool.wait() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, cancelling run...");
            pool.cancel().await;
            pool.wait().await;
        }
    }

    println!();
    println!(
        "📊 {}/{} attempts, ✅ {} successful, ❌ {} failed",
        summary.completed(),
        total,
        summary.succeeded(),
        summary.failed()
    );
    println!(
        "⏱️  Finished in {:.1}s with status {:?}",
        started.elapsed().as_secs_f64(),
        pool.status()
    );

    Ok(())
}
