//! Logging, tracing and metrics for casegate
//!
//! This module installs the `tracing` subscriber and, when enabled, exports
//! spans and metrics to an OTLP endpoint.

use crate::config::{LoggingConfig, OtelConfig};
use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter, MeterProvider as _},
    trace::TracerProvider as TracerProviderTrait,
    KeyValue,
};
use opentelemetry_sdk::{metrics::SdkMeterProvider, trace::TracerProvider, Resource};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Telemetry error types
#[derive(Debug, Error)]
pub enum OtelError {
    /// Failed to initialize tracer
    #[error("Failed to initialize tracer: {0}")]
    TracerInit(String),

    /// Failed to initialize meter
    #[error("Failed to initialize meter: {0}")]
    MeterInit(String),

    /// Failed to shutdown
    #[error("Failed to shutdown: {0}")]
    Shutdown(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// OpenTelemetry provider
///
/// Manages tracing and metrics providers with OTLP export capability. When
/// disabled, the meter provider has no reader and instruments are no-ops.
pub struct OtelProvider {
    tracer_provider: Option<TracerProvider>,
    meter_provider: SdkMeterProvider,
    config: OtelConfig,
}

impl OtelProvider {
    /// Create a new OtelProvider with the given configuration
    pub fn new(config: &OtelConfig) -> Result<Self, OtelError> {
        let resource = Resource::new(vec![KeyValue::new(
            "service.name",
            config.service_name.clone(),
        )]);

        let (tracer_provider, meter_provider) = if config.enabled {
            let endpoint = config.endpoint.as_ref().ok_or_else(|| {
                OtelError::Config("OTLP endpoint is required when enabled".into())
            })?;

            let tracer_provider = Self::init_tracer_provider(endpoint, &resource)?;
            let meter_provider = Self::init_meter_provider(endpoint, &resource)?;

            (Some(tracer_provider), meter_provider)
        } else {
            let meter_provider = SdkMeterProvider::builder().with_resource(resource).build();
            (None, meter_provider)
        };

        if let Some(ref tp) = tracer_provider {
            global::set_tracer_provider(tp.clone());
        }

        Ok(Self {
            tracer_provider,
            meter_provider,
            config: config.clone(),
        })
    }

    fn init_tracer_provider(
        endpoint: &str,
        resource: &Resource,
    ) -> Result<TracerProvider, OtelError> {
        use opentelemetry_otlp::WithExportConfig;
        use opentelemetry_sdk::runtime;
        use opentelemetry_sdk::trace::{Config, Sampler};

        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint)
            .build_span_exporter()
            .map_err(|e| OtelError::TracerInit(e.to_string()))?;

        let trace_config = Config::default()
            .with_sampler(Sampler::AlwaysOn)
            .with_resource(resource.clone());

        Ok(TracerProvider::builder()
            .with_batch_exporter(exporter, runtime::Tokio)
            .with_config(trace_config)
            .build())
    }

    fn init_meter_provider(
        endpoint: &str,
        resource: &Resource,
    ) -> Result<SdkMeterProvider, OtelError> {
        use opentelemetry_otlp::{MetricsExporterBuilder, WithExportConfig};
        use opentelemetry_sdk::metrics::reader::{
            DefaultAggregationSelector, DefaultTemporalitySelector,
        };
        use opentelemetry_sdk::{metrics::PeriodicReader, runtime};

        let exporter = MetricsExporterBuilder::from(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .build_metrics_exporter(
            Box::new(DefaultTemporalitySelector::new()),
            Box::new(DefaultAggregationSelector::new()),
        )
        .map_err(|e| OtelError::MeterInit(e.to_string()))?;

        let reader = PeriodicReader::builder(exporter, runtime::Tokio).build();

        Ok(SdkMeterProvider::builder()
            .with_resource(resource.clone())
            .with_reader(reader)
            .build())
    }

    /// Get a tracer from the provider
    pub fn tracer(&self, name: &'static str) -> opentelemetry_sdk::trace::Tracer {
        match self.tracer_provider {
            Some(ref tp) => tp.tracer(name),
            None => TracerProvider::builder().build().tracer(name),
        }
    }

    /// Get the meter for creating metrics
    pub fn meter(&self) -> Meter {
        self.meter_provider.meter(self.config.service_name.clone())
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Flush and shut down the providers
    pub fn shutdown(&self) -> Result<(), OtelError> {
        if let Err(e) = self.meter_provider.shutdown() {
            return Err(OtelError::Shutdown(format!(
                "Meter shutdown failed: {:?}",
                e
            )));
        }

        if let Some(ref tp) = self.tracer_provider {
            for result in tp.force_flush() {
                if let Err(e) = result {
                    return Err(OtelError::Shutdown(format!("Tracer flush failed: {:?}", e)));
                }
            }
        }

        Ok(())
    }
}

impl Drop for OtelProvider {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

/// Counters and histograms for the auth gate
pub struct AuthMetrics {
    /// Login attempts by outcome
    pub logins_total: Counter<u64>,

    /// Registrations by outcome
    pub registrations_total: Counter<u64>,

    /// Requests rejected by the access pipeline or policy, by reason
    pub rejections_total: Counter<u64>,

    /// Requests denied by a rate limit rule, by rule
    pub rate_limited_total: Counter<u64>,

    /// Request processing duration in seconds
    pub request_duration: Histogram<f64>,
}

impl AuthMetrics {
    pub fn new(meter: &Meter) -> Self {
        let logins_total = meter
            .u64_counter("casegate_logins_total")
            .with_description("Login attempts by outcome")
            .init();

        let registrations_total = meter
            .u64_counter("casegate_registrations_total")
            .with_description("Registrations by outcome")
            .init();

        let rejections_total = meter
            .u64_counter("casegate_auth_rejections_total")
            .with_description("Requests rejected by authentication or authorization")
            .init();

        let rate_limited_total = meter
            .u64_counter("casegate_rate_limited_total")
            .with_description("Requests denied by rate limiting")
            .init();

        let request_duration = meter
            .f64_histogram("casegate_request_duration_seconds")
            .with_description("Request processing duration in seconds")
            .init();

        Self {
            logins_total,
            registrations_total,
            rejections_total,
            rate_limited_total,
            request_duration,
        }
    }

    /// Metrics bound to a provider-less meter, for tests and tools
    pub fn noop() -> Self {
        Self::new(&SdkMeterProvider::builder().build().meter("casegate"))
    }

    pub fn record_login(&self, outcome: &'static str) {
        self.logins_total
            .add(1, &[KeyValue::new("outcome", outcome)]);
    }

    pub fn record_registration(&self, outcome: &'static str) {
        self.registrations_total
            .add(1, &[KeyValue::new("outcome", outcome)]);
    }

    pub fn record_rejection(&self, reason: &'static str) {
        self.rejections_total
            .add(1, &[KeyValue::new("reason", reason)]);
    }

    pub fn record_rate_limited(&self, rule: &str) {
        self.rate_limited_total
            .add(1, &[KeyValue::new("rule", rule.to_string())]);
    }

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

/// Install the global tracing subscriber
///
/// `RUST_LOG` overrides the configured level when set. The format is
/// `json` (default) or `pretty`.
pub fn init_tracing(otel: &OtelProvider, logging: &LoggingConfig) -> Result<(), OtelError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(normalize_level(&logging.level)));

    let otel_layer = otel
        .is_enabled()
        .then(|| tracing_opentelemetry::layer().with_tracer(otel.tracer("casegate")));

    let (json_layer, pretty_layer) = if logging.format.eq_ignore_ascii_case("pretty") {
        (None, Some(tracing_subscriber::fmt::layer().pretty()))
    } else {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(otel_layer)
        .with(json_layer)
        .with(pretty_layer)
        .try_init()
        .map_err(|e| OtelError::TracerInit(e.to_string()))
}

fn normalize_level(level: &str) -> &'static str {
    match level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    }
}
