//! Job configuration discovery agent.
//!
//! Spawned by a monitoring host process. Discovers job configurations
//! from files and from runtime commands arriving on stdin, and speaks
//! the host's line protocol on stdout.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌───────────────────────────────────────────────┐
//!                  │                  CONFSTREAM                    │
//!                  │                                                │
//!   job files ─────┼─▶ file read ──┐                                │
//!                  │               │                                │
//!   fs events ─────┼─▶ file watch ─┼─▶ group channel ─▶ consumer ───┼─▶ scheduler
//!                  │               │                     │          │   (external)
//!   stdin ─────────┼─▶ functions ─▶ dyncfg ──────────────┘          │
//!   (host)         │   router      controller                       │
//!                  │                  │                             │
//!                  │                  ▼                             │
//!   stdout ◀───────┼── host api (CONFIG / FUNCTION_RESULT frames)   │
//!   (host)         │                                                │
//!                  └───────────────────────────────────────────────┘
//! ```

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use confstream::config::{load_config, AgentConfig};
use confstream::discovery::{group_channel, GroupReceiver};
use confstream::jobcfg::{Config, ModuleRegistry};
use confstream::lifecycle::signals;
use confstream::protocol::JobStatus;
use confstream::{DyncfgController, FunctionRouter, LineApi, Reader, Shutdown, Watcher};

#[derive(Parser)]
#[command(name = "confstream")]
#[command(about = "Job configuration discovery agent", long_about = None)]
struct Cli {
    /// Path to the agent configuration file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Glob pattern scanned once at startup (repeatable, adds to the
    /// config file's list).
    #[arg(long)]
    read: Vec<String>,

    /// Glob pattern watched continuously (repeatable, adds to the
    /// config file's list).
    #[arg(long)]
    watch: Vec<String>,

    /// Expand the read patterns, print every discovered group as
    /// YAML, and exit.
    #[arg(long)]
    dump: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AgentConfig::default(),
    };
    config.discovery.read.extend(cli.read.iter().cloned());
    config.discovery.watch.extend(cli.watch.iter().cloned());

    confstream::observability::logging::init(&config.observability.log_level);

    tracing::info!(
        plugin = config.plugin_name(),
        read = config.discovery.read.len(),
        watch = config.discovery.watch.len(),
        "configuration loaded"
    );

    if cli.dump {
        return dump(&config).await;
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => confstream::observability::metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let reload_tx = signals::install(shutdown.clone());

    let (groups_tx, groups_rx) = group_channel();

    if !config.discovery.read.is_empty() {
        let reader = Reader::new(&config.discovery.read, groups_tx.clone());
        tokio::spawn(reader.run());
    }

    if !config.discovery.watch.is_empty() {
        let watcher = Watcher::new(&config.discovery.watch, groups_tx.clone())
            .with_refresh(std::time::Duration::from_secs(config.discovery.refresh_secs));
        tokio::spawn(watcher.run(shutdown.subscribe()));
    }

    // Collector modules are registered by the embedding agent; the
    // standalone binary announces none and serves file discovery only.
    let modules = Arc::new(ModuleRegistry::new());

    let api = Arc::new(LineApi::stdout(config.plugin_name()));
    let controller = DyncfgController::new(api, modules, groups_tx.clone());

    let router = Arc::new(FunctionRouter::new());
    controller.install_handlers(router.as_ref());

    tokio::spawn(controller.clone().run(shutdown.subscribe(), reload_tx.subscribe()));

    // stdin EOF means the host is gone; take the whole agent down
    let stdin_router = Arc::clone(&router);
    let stdin_shutdown = shutdown.clone();
    tokio::spawn(async move {
        stdin_router.run(tokio::io::stdin(), stdin_shutdown.subscribe()).await;
        stdin_shutdown.trigger();
    });

    drop(groups_tx);
    consume(groups_rx, &controller, shutdown).await;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Stand-in for the external job scheduler: logs every group, keeps
/// the dyncfg controller's bookkeeping current, and reports accepted
/// jobs back to the host.
async fn consume(
    mut groups: GroupReceiver,
    controller: &DyncfgController,
    shutdown: Shutdown,
) {
    let mut running: HashMap<String, Vec<Config>> = HashMap::new();
    let mut on_shutdown = shutdown.subscribe();

    loop {
        let batch = tokio::select! {
            _ = on_shutdown.recv() => break,
            batch = groups.recv() => match batch {
                Some(batch) => batch,
                None => break,
            },
        };

        for group in batch {
            tracing::info!(
                source = %group.source,
                configs = group.configs.len(),
                "configuration group"
            );

            let prior = running.remove(&group.source).unwrap_or_default();
            let kept: HashSet<String> = group.configs.iter().map(Config::identity).collect();
            for cfg in prior.iter().filter(|c| !kept.contains(&c.identity())) {
                controller.unregister(cfg);
            }

            for cfg in &group.configs {
                controller.register(cfg);
                controller.update_status(cfg, JobStatus::Accepted, "");
            }

            if !group.configs.is_empty() {
                running.insert(group.source.clone(), group.configs);
            }
        }
    }
}

/// One-shot discovery printout for `--dump`.
async fn dump(config: &AgentConfig) -> Result<(), Box<dyn std::error::Error>> {
    let (tx, mut rx) = group_channel();
    Reader::new(&config.discovery.read, tx).run().await;

    while let Some(batch) = rx.recv().await {
        for group in batch {
            println!("# source: {}", group.source);
            for cfg in &group.configs {
                print!("{}", serde_yaml::to_string(cfg)?);
                println!("---");
            }
        }
    }
    Ok(())
}
