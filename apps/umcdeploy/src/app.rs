//! The deploy command.

use std::path::PathBuf;

use anyhow::Context;
use umcdeploy_content_store::{ContentStoreClient, StoreConnector};
use umcdeploy_publish::{
    BuildStrategy, CommandBuild, DeploymentRecord, GatewayConfig, JsonFileRecorder, PublishEvent,
    PublishOrchestrator, PublishResult, PublishSettings, acquire_build, load_latest,
    package_version,
};

use crate::config::{Config, DeployMode};
use crate::display;

/// Options collected from the command line.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub build: bool,
    pub skip_build: bool,
    pub root: PathBuf,
    pub config: Option<PathBuf>,
}

/// What a successful run published, and what it replaced.
#[derive(Debug)]
pub struct RunSummary {
    pub result: PublishResult,
    /// Record found before publishing; `Some` means the run republished.
    pub previous: Option<DeploymentRecord>,
}

pub async fn run(
    options: RunOptions,
    connector: Box<dyn StoreConnector>,
) -> anyhow::Result<RunSummary> {
    display::banner();

    let root = options.root;
    let config = Config::load(options.config.as_deref(), &root)?;
    let mode = DeployMode::from_env_value(std::env::var("NODE_ENV").ok().as_deref());
    tracing::info!(mode = mode.as_str(), root = %root.display(), "deploying");

    // Build
    let strategy = BuildStrategy::from_flags(options.build, options.skip_build);
    let dist = root.join(&config.dist_dir);
    display::step(&format!("Preparing build ({})", dist.display()));
    let producer = CommandBuild::new(&config.build_command, &root)?;
    let build_path = acquire_build(strategy, &producer, &dist)
        .await
        .context("build step failed")?;

    // Store and recorder
    let store_config = config.store_config(|key| std::env::var(key).ok(), mode);
    let store = ContentStoreClient::new(store_config, connector);

    let record_path = root.join(&config.record_path);
    let mut recorder = JsonFileRecorder::new(&record_path);
    if let Some(history) = &config.history_path {
        recorder = recorder.with_history(root.join(history));
    }
    let previous = match load_latest(&record_path) {
        Ok(previous) => previous,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable deployment record");
            None
        }
    };

    let settings = PublishSettings {
        gateways: GatewayConfig::new(&config.deployment.gateways),
        auto_pin: config.deployment.auto_pin,
        version: package_version(&root),
    };

    let mut orchestrator = PublishOrchestrator::new(&store, &recorder, settings);
    let printer = orchestrator.take_events().map(|mut events| {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                display::event(&event);
                if matches!(event, PublishEvent::Completed { .. } | PublishEvent::Failed { .. }) {
                    break;
                }
            }
        })
    });

    let outcome = match &previous {
        Some(record) => {
            display::step(&format!("Previous deployment: {}", record.cid));
            orchestrator.republish(&record.cid, &build_path).await
        }
        None => orchestrator.publish(&build_path).await,
    };

    drop(orchestrator);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let result = outcome.context("deployment failed")?;
    display::results(&result, previous.as_ref(), config.deployment.ens_domain.as_deref());
    Ok(RunSummary { result, previous })
}
