use std::time::Duration;

use anyhow::Context;
use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use clap::Parser;
use dotenvy::dotenv;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use plutus_cli::{Command, Config};
use plutus_client::PolygonClient;
use plutus_core::traits::InstrumentStore;
use plutus_core::{AppError, IngestPipeline, RunSummary, TracingReporter};
use plutus_db::InstrumentRepository;

type Pipeline = IngestPipeline<PolygonClient, InstrumentRepository>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::parse();

    let filter = EnvFilter::try_new(&config.log_level)
        .with_context(|| format!("Invalid log filter '{}'", config.log_level))?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Setting default subscriber failed")?;

    match &config.command {
        Command::Run => run(&config).await,
        Command::Daemon { at } => daemon(&config, *at).await,
        Command::Stats => show_stats(&config).await,
        Command::Check => check(&config).await,
    }
}

/// Surfaces a core error with its CLI-oriented message.
fn user_error(err: AppError) -> anyhow::Error {
    anyhow::anyhow!(err.user_message())
}

/// Validates configuration and wires the pipeline.
///
/// The credential and every configured value are checked before the database or
/// the API is contacted.
async fn build_pipeline(config: &Config) -> anyhow::Result<Pipeline> {
    let api_key = config.api_key().map_err(user_error)?;
    let pipeline_config = config.pipeline_config().map_err(user_error)?;

    let client = PolygonClient::new(&config.http_config(), api_key).map_err(user_error)?;

    info!("Connecting to database...");
    let repo = InstrumentRepository::connect(&config.db_config())
        .await
        .map_err(user_error)?;
    repo.ensure_schema().await.map_err(user_error)?;

    info!(
        calls_per_minute = pipeline_config.rate_limit.calls_per_minute,
        max_pages = pipeline_config.fetch.max_pages,
        market = %pipeline_config.fetch.query.market,
        sink = %pipeline_config.sink.path.display(),
        "Pipeline ready"
    );

    Ok(IngestPipeline::new(client, repo, pipeline_config))
}

async fn run(config: &Config) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config).await?;

    let cancel_token = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel_token.clone()));

    let summary = pipeline
        .run_once_cancellable(Local::now().date_naive(), &TracingReporter, cancel_token)
        .await
        .map_err(user_error)?;
    print_run_summary(&summary);

    Ok(())
}

/// Runs immediately, then once a day at `at` (local time) until SIGINT/SIGTERM.
///
/// A failed run is logged and the schedule continues. Runs never overlap: the next
/// one is scheduled only after the previous one has returned.
async fn daemon(config: &Config, at: NaiveTime) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config).await?;

    let cancel_token = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel_token.clone()));

    info!(at = %at.format("%H:%M"), "Daemon started");

    loop {
        let today = Local::now().date_naive();
        match pipeline
            .run_once_cancellable(today, &TracingReporter, cancel_token.clone())
            .await
        {
            Ok(summary) => print_run_summary(&summary),
            Err(AppError::Cancelled) => break,
            Err(e) => error!("Run failed: {}", e.user_message()),
        }

        if cancel_token.is_cancelled() {
            break;
        }

        let (next_run, wait) = next_run_after(Local::now().naive_local(), at);
        info!(next_run = %next_run, "Waiting for next scheduled run");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = cancel_token.cancelled() => break,
        }
    }

    info!("Daemon stopped");
    Ok(())
}

/// Next occurrence of `at` strictly after `now`, and the wait until then.
fn next_run_after(now: NaiveDateTime, at: NaiveTime) -> (NaiveDateTime, Duration) {
    let mut next = now.date().and_time(at);
    if next <= now {
        next += TimeDelta::days(1);
    }
    let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
    (next, wait)
}

/// Cancels `token` on Ctrl+C or SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, finishing current step...");
    token.cancel();
}

fn print_run_summary(summary: &RunSummary) {
    eprintln!();
    eprintln!("═══════════════════════════════════════════════════════");
    eprintln!("  RUN COMPLETE");
    eprintln!("═══════════════════════════════════════════════════════");
    eprintln!("  Pages requested:     {}", summary.pages);
    eprintln!("  Records fetched:     {}", summary.fetched);
    eprintln!("  Dropped (no ticker): {}", summary.dropped);
    eprintln!("  Duplicates merged:   {}", summary.duplicates);
    eprintln!("───────────────────────────────────────────────────────");
    eprintln!("  Rows appended:       {}", summary.persist.written);
    eprintln!("  + Created:           {}", summary.persist.created);
    eprintln!("  ↑ Updated:           {}", summary.persist.updated);
    eprintln!("  ✗ Failed:            {}", summary.persist.failed);
    if !summary.persist.failed_tickers.is_empty() {
        eprintln!("    {}", summary.persist.failed_tickers.join(", "));
    }
    eprintln!("═══════════════════════════════════════════════════════");
    eprintln!();
}

async fn show_stats(config: &Config) -> anyhow::Result<()> {
    let repo = InstrumentRepository::connect(&config.db_config())
        .await
        .map_err(user_error)?;
    let stats = repo.get_stats().await.map_err(user_error)?;

    println!("\n📊 Store Statistics\n");
    println!("  Total instruments:     {}", stats.total_instruments);
    println!("  Active instruments:    {}", stats.active_instruments);
    match stats.latest_date_stamp {
        Some(date) => println!("  Latest run date:       {}", date),
        None => println!("  Latest run date:       never"),
    }
    println!();

    Ok(())
}

async fn check(config: &Config) -> anyhow::Result<()> {
    let mut problems = 0;

    match config.api_key() {
        Ok(key) => println!("  ✓ API key:        {}", key),
        Err(e) => {
            problems += 1;
            println!("  ✗ API key:        {}", e.user_message());
        }
    }

    match config.pipeline_config() {
        Ok(pipeline) => println!(
            "  ✓ Pipeline:       {} calls/min, {} attempts, {} extra pages, sink {}",
            pipeline.rate_limit.calls_per_minute,
            pipeline.rate_limit.max_attempts,
            pipeline.fetch.max_pages,
            pipeline.sink.path.display()
        ),
        Err(e) => {
            problems += 1;
            println!("  ✗ Pipeline:       {}", e.user_message());
        }
    }

    let db_config = config.db_config();
    let db_result = match InstrumentRepository::connect(&db_config).await {
        Ok(repo) => InstrumentStore::health_check(&repo).await,
        Err(e) => Err(e),
    };
    match db_result {
        Ok(()) => println!("  ✓ Database:       reachable ({:?})", db_config),
        Err(e) => {
            problems += 1;
            println!("  ✗ Database:       {}", e.user_message());
        }
    }

    if problems > 0 {
        anyhow::bail!("{} check(s) failed", problems);
    }
    println!("\nAll checks passed.");
    Ok(())
}
