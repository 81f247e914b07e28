//! Process telemetry: logging subscriber, trace export and context propagation.
//!
//! [`Telemetry`] is constructed once by each binary and passed down
//! explicitly. It owns the tracer provider (exporting over OTLP when an agent
//! is configured) and the propagator used to move causal context across HTTP and the bus. No
//! global tracer provider or global propagator is installed.

use std::sync::Arc;

use opentelemetry::propagation::{TextMapCompositePropagator, TextMapPropagator};
use opentelemetry::trace::{TraceContextExt, TracerProvider as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use opentelemetry_sdk::trace::{Builder as TracerProviderBuilder, Sampler, TracerProvider};
use opentelemetry_sdk::Resource;
use tracing::{info, warn};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{TelemetryConfig, LOG_ENV_VAR};

/// Propagator shared between the HTTP layer, the broker and the worker.
pub type SharedPropagator = Arc<dyn TextMapPropagator + Send + Sync>;

/// Errors raised while setting up or tearing down telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Trace pipeline error: {0}")]
    Trace(#[from] opentelemetry::trace::TraceError),

    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// W3C trace context plus baggage.
pub fn default_propagator() -> SharedPropagator {
    Arc::new(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]))
}

/// Telemetry handle owned by a process entry point.
pub struct Telemetry {
    service_name: String,
    propagator: SharedPropagator,
    provider: TracerProvider,
    exporting: bool,
}

impl Telemetry {
    /// Build the propagator and trace pipeline, then install the tracing
    /// subscriber.
    ///
    /// Spans always get OpenTelemetry identifiers, so causal context crosses
    /// process boundaries whether or not anything is exported. They are
    /// exported over OTLP only when `config.otlp_endpoint` is set and the
    /// `otel` feature is enabled.
    pub fn init(config: &TelemetryConfig, service_name: &str) -> Result<Self, TelemetryError> {
        let (provider, exporting) = build_provider(config, service_name)?;

        let filter = config
            .log_filter
            .as_deref()
            .map(EnvFilter::new)
            .or_else(|| EnvFilter::try_from_env(LOG_ENV_VAR).ok())
            .unwrap_or_else(|| EnvFilter::new("info"));

        let otel_layer =
            tracing_opentelemetry::layer().with_tracer(provider.tracer(service_name.to_string()));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .with(otel_layer)
            .try_init()?;

        info!(service = %service_name, export = exporting, "Telemetry initialized");

        Ok(Self {
            service_name: service_name.to_string(),
            propagator: default_propagator(),
            provider,
            exporting,
        })
    }

    /// Telemetry that records spans without exporting them and without
    /// installing a global subscriber. Pair with [`Telemetry::scoped_subscriber`].
    pub fn local(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            propagator: default_propagator(),
            provider: provider_builder(service_name).build(),
            exporting: false,
        }
    }

    /// Subscriber with only the OpenTelemetry layer, for scoped use through
    /// [`tracing::instrument::WithSubscriber`].
    pub fn scoped_subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        tracing_subscriber::registry().with(
            tracing_opentelemetry::layer().with_tracer(self.provider.tracer(self.service_name.clone())),
        )
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn propagator(&self) -> SharedPropagator {
        self.propagator.clone()
    }

    pub fn is_exporting(&self) -> bool {
        self.exporting
    }

    /// Flush pending spans and shut the provider down.
    pub fn shutdown(self) -> Result<(), TelemetryError> {
        for result in self.provider.force_flush() {
            if let Err(e) = result {
                warn!(error = %e, "Failed to flush spans");
            }
        }
        self.provider.shutdown()?;
        info!(service = %self.service_name, "Telemetry shut down");
        Ok(())
    }
}

fn provider_builder(service_name: &str) -> TracerProviderBuilder {
    TracerProvider::builder()
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            service_name.to_string(),
        )]))
}

/// Provider for `service_name`, plus whether it exports.
#[cfg(feature = "otel")]
fn build_provider(
    config: &TelemetryConfig,
    service_name: &str,
) -> Result<(TracerProvider, bool), TelemetryError> {
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::runtime;

    let builder = provider_builder(service_name);
    let Some(endpoint) = config.otlp_endpoint.as_deref() else {
        return Ok((builder.build(), false));
    };

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(otlp_url(endpoint))
        .build()?;

    Ok((
        builder.with_batch_exporter(exporter, runtime::Tokio).build(),
        true,
    ))
}

#[cfg(not(feature = "otel"))]
fn build_provider(
    config: &TelemetryConfig,
    service_name: &str,
) -> Result<(TracerProvider, bool), TelemetryError> {
    if config.otlp_endpoint.is_some() {
        warn!("OTLP endpoint configured but the 'otel' feature is disabled; spans stay local");
    }
    Ok((provider_builder(service_name).build(), false))
}

/// Agents are usually configured as bare `host:port`.
#[cfg_attr(not(feature = "otel"), allow(dead_code))]
fn otlp_url(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}

/// Causal context to propagate from within `span`.
///
/// Falls back to `parent` when no OpenTelemetry layer produced a valid span
/// context (no OpenTelemetry layer installed), so the upstream link is never lost.
pub fn span_context(span: &tracing::Span, parent: &Context) -> Context {
    let cx = span.context();
    if cx.span().span_context().is_valid() {
        cx
    } else {
        parent.clone()
    }
}
