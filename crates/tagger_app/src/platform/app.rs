use std::path::PathBuf;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use log::LevelFilter;
use tagger_engine::{
    ensure_state_dir, load_or_create_machine_id, AlertSink, ChannelEventSink, Clock, EventSink,
    FixedClock, HttpAlertSink, HttpMappingStore, HttpPanelRegistry, LetterResolver, MappingStore,
    MemoryMappingStore, NullAlertSink, PanelRegistry, PipelineRunner, StaticPanelRegistry,
    SystemClock,
};
use tagger_logging::tagger_info;
use tokio::sync::mpsc;

use super::config::{load_config, AppConfig};
use super::logging::{self, LogDestination};
use super::persistence::{load_metrics, save_metrics, save_notes};
use super::prompt::{print_events, spawn_operator_input, TerminalPrompt};
use super::replay::{load_snapshot, ReplayDriver};

#[derive(Parser, Debug)]
#[command(
    name = "inbox-tagger",
    version,
    about = "Tags inbox conversations with campaign tracking codes"
)]
struct Cli {
    /// Recorded inbox snapshot (RON) to run the pipeline against
    #[arg(long, required_unless_present = "show_metrics")]
    inbox: Option<PathBuf>,
    /// Optional RON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Where conversation notes are written after the run
    #[arg(long, default_value = "notes.ron")]
    notes_out: PathBuf,
    /// Stop after this many completed batches (default: run until Ctrl-C)
    #[arg(long)]
    batches: Option<u64>,
    /// Log destination
    #[arg(long, value_enum, default_value_t = LogDestination::Terminal)]
    log: LogDestination,
    /// Log debug messages too
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
    /// Ignore configured remote services and keep mappings in memory
    #[arg(long, action = ArgAction::SetTrue)]
    offline: bool,
    /// Print the collected metrics ledger and exit
    #[arg(long, action = ArgAction::SetTrue)]
    show_metrics: bool,
}

pub fn run_app() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let config = load_config(cli.config.as_deref())?;
    logging::initialize(cli.log, level, &config.state_dir);
    if let Some(path) = cli.config.as_deref() {
        tagger_info!("loaded configuration from {}", path.display());
    }
    if cli.show_metrics {
        print_metrics(&config);
        return Ok(());
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run(cli, config));
    // The stdin reader may still be parked on a blocking read.
    runtime.shutdown_timeout(Duration::from_millis(200));
    result
}

struct RemoteServices {
    store: Arc<dyn MappingStore>,
    registry: Arc<dyn PanelRegistry>,
    alerts: Arc<dyn AlertSink>,
}

fn remote_services(
    cli: &Cli,
    config: &AppConfig,
    machine_id: String,
) -> anyhow::Result<RemoteServices> {
    match (&config.remote, cli.offline) {
        (Some(remote), false) => {
            tagger_info!(
                "using remote stores at {} and {}",
                remote.registry_base_url,
                remote.mappings_base_url
            );
            Ok(RemoteServices {
                store: Arc::new(HttpMappingStore::new(remote, machine_id)?),
                registry: Arc::new(HttpPanelRegistry::new(remote)?),
                alerts: Arc::new(HttpAlertSink::new(remote)?),
            })
        }
        _ => {
            tagger_info!("running offline; letters are kept for this session only");
            Ok(RemoteServices {
                store: Arc::new(MemoryMappingStore::new()),
                registry: Arc::new(StaticPanelRegistry::new(config.fallback_panels.clone())),
                alerts: Arc::new(NullAlertSink),
            })
        }
    }
}

async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    ensure_state_dir(&config.state_dir)?;
    let machine_id = load_or_create_machine_id(&config.state_dir)?;
    tagger_info!("machine id {machine_id}");

    let inbox = cli
        .inbox
        .as_deref()
        .ok_or_else(|| anyhow!("--inbox is required"))?;
    let snapshot = load_snapshot(inbox)?;
    tagger_info!(
        "replaying {} conversations from {}",
        snapshot.chats.len(),
        inbox.display()
    );
    let clock: Arc<dyn Clock> = match snapshot.observed_at {
        Some(at) => Arc::new(FixedClock(at)),
        None => Arc::new(SystemClock),
    };
    let driver = Arc::new(ReplayDriver::new(snapshot.chats));

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let events: Arc<dyn EventSink> = Arc::new(ChannelEventSink::new(event_tx));
    let printer = tokio::spawn(print_events(event_rx));

    let services = remote_services(&cli, &config, machine_id)?;
    let resolver = Arc::new(LetterResolver::new(
        services.store,
        Arc::new(TerminalPrompt),
        Arc::clone(&events),
        config.resolver.clone(),
    ));
    if config.warm_cache {
        resolver.warm_cache().await;
    }
    spawn_operator_input(Arc::clone(&resolver), Arc::clone(&services.registry));

    let mut runner = PipelineRunner::new(
        driver.clone(),
        resolver,
        events,
        config.pipeline.clone(),
    )
    .with_registry(services.registry)
    .with_alerts(services.alerts)
    .with_clock(clock)
    .with_fallback_panels(config.fallback_panels.clone());
    if let Some(batches) = cli.batches {
        runner = runner.with_batch_limit(batches);
    }

    let stop = runner.stop_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tagger_info!("Ctrl-C received; stopping after the current step");
            stop.cancel();
        }
    });

    let summary = runner.run().await;

    let notes_path = save_notes(&cli.notes_out, &driver.notes())?;
    tagger_info!(
        "{} notes saves; notes written to {}",
        driver.writes(),
        notes_path.display()
    );
    let metrics = runner.metrics();
    let run_metrics = metrics
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    save_metrics(&config.state_dir, &run_metrics);

    tokio::task::yield_now().await;
    printer.abort();
    println!(
        "{} batches, {} chats tagged, {} skipped",
        summary.batches, summary.tagged, summary.skipped
    );
    Ok(())
}

fn print_metrics(config: &AppConfig) {
    let metrics = load_metrics(&config.state_dir);
    if metrics.is_empty() {
        println!("No metrics collected yet.");
        return;
    }
    for (code, per_url) in metrics.codes() {
        println!("{code}");
        for (url, count) in per_url {
            println!("  {count:>5}  {url}");
        }
    }
}
