//! Tracing subscriber and optional OpenTelemetry export.
//!
//! Logs go to stderr so that command output on stdout stays pipeable.

use anyhow::Context;
use opentelemetry::{trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace::TracerProvider, Resource};
use tracing::warn;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::TelemetryConfig;

/// Default filter when `RUST_LOG` is unset. Keeps dependencies quiet; the
/// `storybook` directive covers both the domain crate and this binary.
const DEFAULT_FILTER: &str = "warn,storybook=info,llm=info,backend=info,render=info,studio=info";

/// Keeps the span exporter alive; call [`Telemetry::shutdown`] before exit so
/// buffered spans are flushed.
pub struct Telemetry {
    provider: Option<TracerProvider>,
}

impl Telemetry {
    pub fn shutdown(self) {
        if let Some(provider) = self.provider {
            if let Err(error) = provider.shutdown() {
                warn!(%error, "failed to flush spans");
            }
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber. Must be called from within the Tokio
/// runtime when OTLP export is configured.
pub fn init(json: bool, telemetry: &TelemetryConfig) -> anyhow::Result<Telemetry> {
    let provider = match telemetry.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint)
                .build()
                .context("building OTLP span exporter")?;
            Some(
                TracerProvider::builder()
                    .with_batch_exporter(exporter, runtime::Tokio)
                    .with_resource(Resource::new(vec![KeyValue::new(
                        "service.name",
                        telemetry.service_name.clone(),
                    )]))
                    .build(),
            )
        }
        None => None,
    };
    let otel = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("storybook")));

    let (json_layer, text_layer) = if json {
        (
            Some(fmt::layer().json().with_writer(std::io::stderr)),
            None,
        )
    } else {
        (
            None,
            Some(fmt::layer().with_target(false).with_writer(std::io::stderr)),
        )
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(json_layer)
        .with(text_layer)
        .with(otel)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(Telemetry { provider })
}
