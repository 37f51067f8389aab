use anyhow::Context as _;
use clap::Parser;
use tracing::{error, info};

use mongo_operator::config::OperatorConfig;
use mongo_operator::{controller, metrics, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = OperatorConfig::parse();
    telemetry::init(&config.log_level, config.log_format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        metrics_addr = %config.metrics_addr,
        "Starting mongo-operator"
    );

    let metrics_addr = config.metrics_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = metrics::serve(metrics_addr).await {
            error!(error = %e, "Metrics server stopped");
        }
    });

    let client = kube::Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    controller::run(client, config).await;
    Ok(())
}
