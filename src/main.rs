use anyhow::{anyhow, Result};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{self, EnvFilter};

use holder_indexer::indexer::{draw_winners, HolderIndexer};
use holder_indexer::metrics::Metrics;
use holder_indexer::models::common::HolderOptions;
use holder_indexer::utils::load_config;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    info!("=========================== INITIALIZING ===========================");

    // Load config
    let config_file = std::env::args().nth(1).unwrap_or_else(|| "config.yml".to_string());
    let config = match load_config(&config_file) {
        Ok(config) => {
            info!("Config loaded successfully");
            config
        }
        Err(e) => {
            error!("Failed to load config: {:#}", e);
            return Err(e);
        }
    };

    let job = config
        .job
        .clone()
        .ok_or_else(|| anyhow!("config has no job section to run"))?;
    let network = config.api_url.host_str().unwrap_or("unknown").to_string();

    // Initialize optional metrics
    let metrics = if config.metrics.enabled {
        let metrics = Arc::new(Metrics::new(network)?);
        metrics
            .start_metrics_server(&config.metrics.address, config.metrics.port)
            .await?;
        Some(metrics)
    } else {
        info!("Metrics are disabled");
        None
    };

    let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    let indexer = HolderIndexer::new(client, config, metrics)?;

    let options = HolderOptions {
        include_reconciliation: job.reconcile,
        decimals: job.decimals,
        timeout: None,
    };

    info!("========================= COLLECTING HOLDERS =========================");
    let result = match &job.profile {
        Some(label) => {
            info!("Replaying {} staked in '{}'", job.asset_key, label);
            indexer
                .reconstruct_holders(&job.asset_key, label, job.asset_type, &options)
                .await
        }
        None => {
            info!("Listing current holders of {}", job.asset_key);
            indexer
                .snapshot_holders(&job.asset_key, job.asset_type, &options)
                .await
        }
    };

    let report = match result {
        Ok(report) => report,
        Err(e) if e.is_not_found() => {
            warn!("{}", e);
            println!("{}", json!({ "asset_key": job.asset_key, "holders": [] }));
            return Ok(());
        }
        Err(e) => {
            error!("Failed to collect holders: {}", e);
            return Err(e.into());
        }
    };

    if let Some(reconciliation) = &report.reconciliation {
        if reconciliation.has_discrepancy() {
            warn!("Replay disagreed with live inventory: {:?}", reconciliation);
        }
    }

    let winners = job
        .winners
        .map(|count| draw_winners(&report.holders, count, job.draw_mode));

    let output = json!({ "report": report, "winners": winners });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
