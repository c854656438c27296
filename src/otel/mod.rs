//! Telemetry for vicdan
//!
//! Structured JSON logs always; OTLP export of spans and metrics when
//! enabled in the configuration. Also holds the application's metric
//! instruments.

use crate::config::OtelConfig;
use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter, MeterProvider as _},
    trace::TracerProvider as _,
    KeyValue,
};
use opentelemetry_otlp::{TonicExporterBuilder, WithExportConfig};
use opentelemetry_sdk::{
    metrics::{
        reader::{DefaultAggregationSelector, DefaultTemporalitySelector},
        PeriodicReader, SdkMeterProvider,
    },
    runtime,
    trace::{Config as TraceConfig, Sampler, Tracer, TracerProvider},
    Resource,
};
use thiserror::Error;
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Telemetry setup and teardown errors
#[derive(Debug, Error)]
pub enum OtelError {
    /// An OTLP exporter could not be built
    #[error("Failed to build {signal} exporter: {reason}")]
    Exporter { signal: &'static str, reason: String },

    /// The global tracing subscriber could not be installed
    #[error("Failed to install subscriber: {0}")]
    Subscriber(String),

    /// Flushing or shutting down a provider failed
    #[error("Failed to shutdown: {0}")]
    Shutdown(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Trace and metric providers for the process
///
/// Without export enabled the meter provider has no reader, so instruments
/// work but record nowhere, and no tracer provider exists.
pub struct Telemetry {
    service_name: String,
    tracer_provider: Option<TracerProvider>,
    meter_provider: SdkMeterProvider,
}

impl Telemetry {
    pub fn new(config: &OtelConfig) -> Result<Self, OtelError> {
        let resource = Resource::new([KeyValue::new(
            "service.name",
            config.service_name.clone(),
        )]);

        let endpoint = match (config.enabled, config.endpoint.as_deref()) {
            (false, _) => None,
            (true, Some(endpoint)) if !endpoint.trim().is_empty() => Some(endpoint),
            (true, _) => {
                return Err(OtelError::Config(
                    "otel.endpoint is required when export is enabled".into(),
                ))
            }
        };

        let mut meter_builder = SdkMeterProvider::builder().with_resource(resource.clone());
        let mut tracer_provider = None;

        if let Some(endpoint) = endpoint {
            let span_exporter = otlp(endpoint)
                .build_span_exporter()
                .map_err(|e| OtelError::Exporter {
                    signal: "span",
                    reason: e.to_string(),
                })?;

            let provider = TracerProvider::builder()
                .with_batch_exporter(span_exporter, runtime::Tokio)
                .with_config(
                    TraceConfig::default()
                        .with_sampler(Sampler::AlwaysOn)
                        .with_resource(resource),
                )
                .build();
            global::set_tracer_provider(provider.clone());
            tracer_provider = Some(provider);

            let metrics_exporter = opentelemetry_otlp::MetricsExporterBuilder::from(otlp(endpoint))
                .build_metrics_exporter(
                    Box::new(DefaultTemporalitySelector::new()),
                    Box::new(DefaultAggregationSelector::new()),
                )
                .map_err(|e| OtelError::Exporter {
                    signal: "metrics",
                    reason: e.to_string(),
                })?;
            meter_builder = meter_builder
                .with_reader(PeriodicReader::builder(metrics_exporter, runtime::Tokio).build());
        }

        Ok(Self {
            service_name: config.service_name.clone(),
            tracer_provider,
            meter_provider: meter_builder.build(),
        })
    }

    /// Whether spans and metrics leave the process
    pub fn is_exporting(&self) -> bool {
        self.tracer_provider.is_some()
    }

    /// Tracer for the OpenTelemetry tracing layer, when exporting
    pub fn tracer(&self) -> Option<Tracer> {
        self.tracer_provider
            .as_ref()
            .map(|tp| tp.tracer(self.service_name.clone()))
    }

    /// Meter for the application's instruments
    pub fn meter(&self) -> Meter {
        self.meter_provider.meter(self.service_name.clone())
    }

    /// Flush spans and stop the metric reader
    pub fn shutdown(&self) -> Result<(), OtelError> {
        if let Some(tp) = &self.tracer_provider {
            if let Some(Err(e)) = tp.force_flush().into_iter().find(Result::is_err) {
                return Err(OtelError::Shutdown(format!("span flush: {:?}", e)));
            }
        }

        self.meter_provider
            .shutdown()
            .map_err(|e| OtelError::Shutdown(format!("meter provider: {:?}", e)))
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

fn otlp(endpoint: &str) -> TonicExporterBuilder {
    opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
}

/// Application metrics
pub struct Metrics {
    /// Login attempts by outcome (success, invalid_credentials, rate_limited, error)
    pub login_attempts_total: Counter<u64>,

    /// Profiles moved to published
    pub profiles_published_total: Counter<u64>,

    /// Anonymous slug lookups by result (found, not_found, error)
    pub public_lookups_total: Counter<u64>,

    /// HTTP request duration in seconds
    pub request_duration: Histogram<f64>,
}

impl Metrics {
    /// Create new metrics with the given meter
    pub fn new(meter: &Meter) -> Self {
        let login_attempts_total = meter
            .u64_counter("vicdan_login_attempts_total")
            .with_description("Login attempts by outcome")
            .init();

        let profiles_published_total = meter
            .u64_counter("vicdan_profiles_published_total")
            .with_description("Profiles published")
            .init();

        let public_lookups_total = meter
            .u64_counter("vicdan_public_lookups_total")
            .with_description("Public profile lookups by result")
            .init();

        let request_duration = meter
            .f64_histogram("vicdan_request_duration_seconds")
            .with_description("HTTP request duration in seconds")
            .init();

        Self {
            login_attempts_total,
            profiles_published_total,
            public_lookups_total,
            request_duration,
        }
    }

    /// Metrics backed by the global (no-op unless installed) meter
    pub fn noop() -> Self {
        Self::new(&global::meter("vicdan"))
    }

    pub fn record_login(&self, outcome: &str) {
        self.login_attempts_total
            .add(1, &[KeyValue::new("outcome", outcome.to_string())]);
    }

    pub fn record_published(&self) {
        self.profiles_published_total.add(1, &[]);
    }

    pub fn record_public_lookup(&self, result: &str) {
        self.public_lookups_total
            .add(1, &[KeyValue::new("result", result.to_string())]);
    }

    /// Record request duration
    pub fn record_request_duration(&self, method: &str, status: u16, duration_secs: f64) {
        self.request_duration.record(
            duration_secs,
            &[
                KeyValue::new("method", method.to_string()),
                KeyValue::new("status", i64::from(status)),
            ],
        );
    }
}

/// Install the global subscriber: JSON logs at `log_level`, plus span
/// export when telemetry is exporting
///
/// Unknown levels fall back to `info`.
pub fn init_tracing(telemetry: &Telemetry, log_level: &str) -> Result<(), OtelError> {
    let filter = parse_level(log_level);
    let otel_layer = telemetry
        .tracer()
        .map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    tracing_subscriber::registry()
        .with(filter)
        .with(otel_layer)
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .map_err(|e| OtelError::Subscriber(e.to_string()))
}

fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_lowercase().as_str() {
        "warning" => LevelFilter::WARN,
        other => other.parse().unwrap_or(LevelFilter::INFO),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_only() -> OtelConfig {
        OtelConfig {
            enabled: false,
            endpoint: None,
            service_name: "vicdan-test".to_string(),
        }
    }

    // Test 1: without export there is no tracer
    #[test]
    fn test_telemetry_local_only() {
        let telemetry = Telemetry::new(&local_only()).unwrap();
        assert!(!telemetry.is_exporting());
        assert!(telemetry.tracer().is_none());
    }

    // Test 2: export without an endpoint is a configuration error
    #[test]
    fn test_export_requires_endpoint() {
        for endpoint in [None, Some("  ".to_string())] {
            let config = OtelConfig {
                enabled: true,
                endpoint,
                ..local_only()
            };

            match Telemetry::new(&config) {
                Err(OtelError::Config(msg)) => assert!(msg.contains("otel.endpoint")),
                _ => panic!("Expected OtelError::Config"),
            }
        }
    }

    // Test 3: instruments record against a reader-less provider
    #[test]
    fn test_metrics_record() {
        let telemetry = Telemetry::new(&local_only()).unwrap();
        let metrics = Metrics::new(&telemetry.meter());

        metrics.record_login("success");
        metrics.record_login("rate_limited");
        metrics.record_published();
        metrics.record_public_lookup("found");
        metrics.record_public_lookup("not_found");
        metrics.record_request_duration("GET", 200, 0.012);
    }

    // Test 4: no-op metrics
    #[test]
    fn test_metrics_noop() {
        let metrics = Metrics::noop();
        metrics.record_login("invalid_credentials");
    }

    // Test 5: shutdown of a local-only provider
    #[test]
    fn test_telemetry_shutdown() {
        let telemetry = Telemetry::new(&local_only()).unwrap();
        assert!(telemetry.shutdown().is_ok());
    }

    // Test 6: level parsing
    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::DEBUG);
        assert_eq!(parse_level(" WARN "), LevelFilter::WARN);
        assert_eq!(parse_level("warning"), LevelFilter::WARN);
        assert_eq!(parse_level("off"), LevelFilter::OFF);
        assert_eq!(parse_level("chatty"), LevelFilter::INFO);
    }

    // Test 7: error display
    #[test]
    fn test_otel_error_display() {
        let err = OtelError::Exporter {
            signal: "span",
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to build span exporter: connection refused"
        );

        let err = OtelError::Shutdown("meter provider: timeout".to_string());
        assert_eq!(err.to_string(), "Failed to shutdown: meter provider: timeout");
    }
}
