//! podwatch - pod and node failure alerting for a Kubernetes cluster.
//!
//! Watches pods and nodes, classifies failures through the filter chains,
//! and fans confirmed new conditions out to the configured sinks.

use anyhow::Context as _;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use podwatch::cluster::KubeCluster;
use podwatch::config::Config;
use podwatch::controller::Controller;
use podwatch::dispatch::{slack::SlackSink, webhook::WebhookSink, AlertSink, Dispatcher};
use podwatch::store::DedupStore;

#[derive(Parser)]
#[command(name = "podwatch", version, about = "Kubernetes pod failure alerting")]
struct Args {
    /// Path to the mounted YAML configuration file
    #[arg(long, env = "PODWATCH_CONFIG", default_value = "/config/config.yaml")]
    config: std::path::PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("podwatch=info")),
        )
        .init();

    let args = Args::parse();

    let config = match Config::from_mounted_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Failed to load configuration, using defaults");
            Config::default_with_serde()
        }
    };
    // Contradictory configuration is surfaced once; behavior with both
    // allow and deny lists set is implementation-defined (deny wins).
    if let Err(e) = config.validate() {
        error!(error = %e, "Configuration validation failed");
    }
    let config = Arc::new(config);

    // Only fatal startup condition: no inbound event stream.
    let client = kube::Client::try_default()
        .await
        .context("failed to establish Kubernetes watch connection")?;

    let sinks: Vec<Arc<dyn AlertSink>> = vec![
        Arc::new(WebhookSink::from_config(config.sinks.webhook_url.as_ref())),
        Arc::new(SlackSink::from_config(
            config.sinks.slack_webhook_url.as_ref(),
        )),
    ];
    let enabled = sinks.iter().filter(|s| s.enabled()).count();
    if enabled == 0 {
        warn!("No alert sinks configured");
    } else {
        info!(sinks = enabled, "Alert sinks configured");
    }
    let dispatcher = Arc::new(Dispatcher::new(sinks, config.sink_timeout()));

    dispatcher
        .dispatch_plain_message(&format!(
            ":eyes: podwatch v{} is watching cluster `{}`",
            env!("CARGO_PKG_VERSION"),
            config.cluster_name
        ))
        .await;

    let lookup = Arc::new(KubeCluster::new(client.clone(), config.lookup_timeout()));
    let store = Arc::new(DedupStore::new());
    let (controller, mut errors_rx) =
        Controller::new(Arc::clone(&config), store, lookup, dispatcher);

    // Abandoned keys surface out-of-band; log them so they are never
    // silently lost.
    tokio::spawn(async move {
        while let Some((key, err)) = errors_rx.recv().await {
            error!(key = %key, error = %err, "Pod evaluation abandoned");
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    controller.run(client, shutdown_rx).await?;
    Ok(())
}
