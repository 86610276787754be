use std::sync::Arc;
use tracing::{error, info};

use axum::{http::StatusCode, routing::get, Router};
use opentelemetry::metrics::{Counter, Gauge, Histogram, MeterProvider};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::{MetricError, SdkMeterProvider};
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;

pub struct Metrics {
    registry: Arc<prometheus::Registry>,
    _provider: SdkMeterProvider,
    pub network: String,

    // Upstream API metrics
    pub api_requests: Counter<u64>,
    pub api_errors: Counter<u64>,
    pub api_retries: Counter<u64>,
    pub api_latency: Histogram<f64>,

    // Replay metrics
    pub events_replayed: Counter<u64>,
    pub replay_warnings: Counter<u64>,
    pub current_holders: Gauge<u64>,
}

impl Metrics {
    pub fn new(network: String) -> Result<Self, MetricError> {
        // Create a new prometheus registry
        let registry = prometheus::Registry::new();

        // Configure OpenTelemetry to use this registry
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        // Set up a meter to create instruments
        let provider = SdkMeterProvider::builder().with_reader(exporter).build();
        let meter = provider.meter("holder_metrics");

        let api_requests = meter
            .u64_counter("holders_api_requests")
            .with_description("Number of upstream API requests made")
            .build();

        let api_errors = meter
            .u64_counter("holders_api_errors")
            .with_description("Number of failed upstream API requests")
            .build();

        let api_retries = meter
            .u64_counter("holders_api_retries")
            .with_description("Number of retried upstream API requests")
            .build();

        let api_latency = meter
            .f64_histogram("holders_api_latency")
            .with_description("Upstream API request latency")
            .with_boundaries(vec![
                0.025, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 1.0, 5.0, 10.0,
            ])
            .with_unit("s")
            .build();

        let events_replayed = meter
            .u64_counter("holders_events_replayed")
            .with_description("Transfer events folded into holder state")
            .build();

        let replay_warnings = meter
            .u64_counter("holders_replay_warnings")
            .with_description("Anomalies met while replaying transfer history")
            .build();

        let current_holders = meter
            .u64_gauge("holders_current_holders")
            .with_description("Holders in the latest reconstructed snapshot")
            .build();

        Ok(Self {
            registry: Arc::new(registry),
            _provider: provider,
            network,
            api_requests,
            api_errors,
            api_retries,
            api_latency,
            events_replayed,
            replay_warnings,
            current_holders,
        })
    }

    pub fn labels(&self, endpoint: &str) -> [KeyValue; 2] {
        [
            KeyValue::new("network", self.network.clone()),
            KeyValue::new("endpoint", endpoint.to_string()),
        ]
    }

    pub async fn start_metrics_server(&self, addr: &str, port: u16) -> anyhow::Result<()> {
        let addr = format!("{addr}:{port}").parse::<SocketAddr>()?;
        let registry = self.registry.clone();

        let app = Router::new().route("/metrics", get(move || metrics_handler(registry.clone())));

        // Determine the access URL based on the binding address. Only used for logging.
        let access_url = if addr.ip().to_string() == "0.0.0.0" {
            format!("http://localhost:{port}/metrics")
        } else {
            format!("http://{}:{port}/metrics", addr.ip())
        };

        info!(
            "Starting metrics server - binding to {} (accessible at {})",
            addr, access_url
        );

        let listener = tokio::net::TcpListener::bind(addr).await?;

        // Spawn the server in a separate task
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Metrics server stopped: {}", e);
            }
        });

        Ok(())
    }
}

async fn metrics_handler(registry: Arc<prometheus::Registry>) -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = vec![];
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
