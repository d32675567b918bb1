//! Binary entrypoint for the Immich slideshow.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Parser};
use humantime::format_duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use immich_slideshow::api::ImmichClient;
use immich_slideshow::config::Configuration;
use immich_slideshow::events::SlideEvent;
use immich_slideshow::tasks::files::TempStore;
use immich_slideshow::tasks::planner::{PlanOptions, Planner};
use immich_slideshow::tasks::{deactivation, display, slideshow};

#[derive(Debug, Parser)]
#[command(
    name = "immich-slideshow",
    version,
    about = "Date-grouped photo slideshow for an Immich server"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Show this day (YYYY-MM-DD) instead of picking one at random
    #[arg(long, value_name = "DATE")]
    date: Option<NaiveDate>,
    /// Deterministic RNG seed for choosing which groups of a busy day are shown
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,
    /// Print the groups planned for one cycle and exit without downloading anything
    #[arg(long)]
    dry_run: bool,
    /// Keep running when stdin reaches end of file (e.g. started with stdin on /dev/null)
    #[arg(long)]
    ignore_stdin: bool,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    // map -v to a default level; RUST_LOG still wins when set
    let default = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .compact()
        .init();
}

/// How long exit waits for blocking work such as a pending stdin read.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    let outcome = runtime.block_on(run(args));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    outcome
}

async fn run(args: Args) -> Result<()> {
    let Args {
        config,
        date,
        seed,
        dry_run,
        ignore_stdin,
        verbose: _,
    } = args;

    let mut cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?
        .validated()
        .context("invalid configuration values")?;
    if date.is_some() {
        cfg.date = date;
    }
    tracing::info!(
        "Loaded configuration from {}:\n{:#?}",
        config.display(),
        cfg
    );

    let client = ImmichClient::from_config(&cfg).context("failed to build Immich client")?;
    let mut planner = Planner::new(client, PlanOptions::from_config(&cfg), seed);

    if dry_run {
        return run_dry_run(&mut planner, cfg.hold_time).await;
    }

    let store = TempStore::new(cfg.data_dir());
    store.prepare().await?;

    let cancel = CancellationToken::new();
    spawn_deactivation_watchers(&cancel, !ignore_stdin);

    let (display_tx, display_rx) = mpsc::channel::<SlideEvent>(16); // Slideshow -> Display
    let presenter = tokio::spawn(display::run(display_rx));

    let outcome = slideshow::run(
        planner,
        store,
        slideshow::SlideshowOptions::from_config(&cfg),
        display_tx,
        cancel.clone(),
    )
    .await;
    cancel.cancel();

    match presenter.await {
        Ok(Ok(state)) => tracing::debug!(shown = state.shown().len(), "display finished"),
        Ok(Err(e)) => tracing::error!("display error: {e:?}"),
        Err(e) => tracing::error!("join error: {e}"),
    }

    let summary = outcome.context("slideshow stopped")?;
    tracing::info!(
        days = summary.days,
        shown = summary.shown,
        skipped = summary.skipped,
        "done"
    );
    Ok(())
}

/// Ctrl-C, SIGTERM and stdin closing all count as the screensaver being deactivated.
fn spawn_deactivation_watchers(cancel: &CancellationToken, watch_stdin: bool) {
    if watch_stdin {
        tokio::spawn(deactivation::watch_input(tokio::io::stdin(), cancel.clone()));
    } else {
        tracing::debug!("ignoring stdin; shutdown only on signals");
    }

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    #[cfg(unix)]
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = sigterm.recv() => {
                            tracing::info!("SIGTERM received; initiating shutdown");
                            cancel.cancel();
                        }
                    }
                }
                Err(err) => tracing::warn!("failed to register SIGTERM handler: {err}"),
            }
        });
    }
}

async fn run_dry_run(planner: &mut Planner, hold: Duration) -> Result<()> {
    let plan = planner
        .next_groups()
        .await
        .context("failed to plan a day")?;

    println!(
        "# slideshow dry run\n# date: {}\n# hold: {}\n# photos: {}\n# clusters: {}\n# groups: {}\n",
        plan.date,
        format_duration(hold),
        plan.photos,
        plan.clusters,
        plan.groups.len()
    );

    if plan.is_empty() {
        println!("(no displayable photos on {})", plan.date);
        return Ok(());
    }

    for (idx, group) in plan.groups.iter().enumerate() {
        let kind = if group.is_burst() { "burst" } else { "normal" };
        println!("  {:>3}: {} x{}", idx + 1, kind, group.len());
        for record in group {
            println!(
                "       {}  {}  {}",
                record.taken_at.format("%H:%M:%S%.3f"),
                record.id,
                record.filename
            );
        }
    }
    Ok(())
}
