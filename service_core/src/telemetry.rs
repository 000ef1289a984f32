use crate::{config::LogLevel, error::StartupError};
use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use prometheus::Registry;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const INFERENCE_DURATION_BOUNDARIES_MS: [f64; 14] = [
    5.0, 10.0, 25.0, 50.0, 100.0, 200.0, 350.0, 500.0, 750.0, 1000.0, 2000.0, 5000.0, 10000.0,
    30000.0,
];

/// JSON logs to stdout. `RUST_LOG` overrides the configured level.
pub fn init_tracing(log_level: &LogLevel) {
    let default_filter = format!("{},ort=warn,tower_http=info", log_level.as_str());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(false)
                .with_level(true)
                .with_thread_names(true)
                .with_thread_ids(true),
        )
        .init();
}

pub struct Metrics {
    request_counter: Counter<u64>,
    inference_duration: Histogram<u64>,
    inference_failures: Counter<u64>,
    pub registry: Registry,
}

impl Metrics {
    pub fn new(service_name: &'static str) -> Result<Self, StartupError> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()
            .map_err(|e| StartupError::Telemetry(e.to_string()))?;

        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter(service_name);
        global::set_meter_provider(provider);

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of inference requests")
            .build();

        let inference_duration = meter
            .u64_histogram("inference_duration_ms")
            .with_boundaries(INFERENCE_DURATION_BOUNDARIES_MS.to_vec())
            .with_description("Duration of model invocations in milliseconds")
            .build();

        let inference_failures = meter
            .u64_counter("inference_failures_total")
            .with_description("Requests that ended in a client or inference error")
            .build();

        Ok(Metrics {
            request_counter,
            inference_duration,
            inference_failures,
            registry,
        })
    }

    pub fn record_request(&self, route: &str) {
        let attributes = [KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_inference_duration(&self, duration_ms: u64, route: &str) {
        let attributes = [KeyValue::new("route", route.to_string())];
        self.inference_duration.record(duration_ms, &attributes);
    }

    pub fn record_failure(&self, route: &str, kind: &'static str) {
        let attributes = [
            KeyValue::new("route", route.to_string()),
            KeyValue::new("kind", kind),
        ];
        self.inference_failures.add(1, &attributes);
    }
}
