use std::fmt;
use std::sync::Arc;

use settle_pipeline_config::LoggingConfig;
use tracing::{field::Visit, Event, Level, Subscriber};
use tracing_subscriber::{
    fmt as fmt_layer,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::collector::MetricsCollector;

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Initialize tracing from the logging configuration
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TracingError> {
    let registry = tracing_subscriber::registry().with(env_filter(config));

    let result = if config.json {
        registry
            .with(fmt_layer::layer().with_target(true).json())
            .try_init()
    } else {
        registry.with(fmt_layer::layer().with_target(true)).try_init()
    };

    result.map_err(|e| TracingError::InitError(e.to_string()))
}

/// Initialize tracing with metrics integration
pub fn init_tracing_with_metrics(
    config: &LoggingConfig,
    collector: Arc<MetricsCollector>,
) -> Result<(), TracingError> {
    let registry = tracing_subscriber::registry()
        .with(env_filter(config))
        .with(MetricsLayer::new(collector));

    let result = if config.json {
        registry
            .with(
                fmt_layer::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .json(),
            )
            .try_init()
    } else {
        registry.with(fmt_layer::layer().with_target(true)).try_init()
    };

    result.map_err(|e| TracingError::InitError(e.to_string()))
}

/// Tracing layer that counts error events by their `error_type` field
pub struct MetricsLayer {
    collector: Arc<MetricsCollector>,
}

impl MetricsLayer {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self { collector }
    }
}

impl<S> Layer<S> for MetricsLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::ERROR {
            return;
        }

        let mut visitor = ErrorTypeVisitor::default();
        event.record(&mut visitor);

        if let Some(error_type) = visitor.error_type.as_deref() {
            self.collector.record_error_event(error_type);
        }
    }
}

/// Visitor to extract the `error_type` field from events
#[derive(Default)]
struct ErrorTypeVisitor {
    error_type: Option<String>,
}

impl Visit for ErrorTypeVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "error_type" {
            self.error_type = Some(format!("{value:?}"));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "error_type" {
            self.error_type = Some(value.to_string());
        }
    }
}

/// Identifier attached to every log line of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(uuid::Uuid);

impl RunId {
    /// Generate a new run ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("tracing initialization error: {0}")]
    InitError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ERROR_EVENTS;
    use tracing::subscriber::with_default;

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
        assert_eq!(RunId::new().to_string().len(), 36);
    }

    #[test]
    fn test_metrics_layer_counts_error_events() {
        let collector = Arc::new(MetricsCollector::new());
        let subscriber = tracing_subscriber::registry().with(MetricsLayer::new(collector));

        let before = ERROR_EVENTS
            .with_label_values(&["layer_test_failure"])
            .get();

        with_default(subscriber, || {
            tracing::error!(error_type = "layer_test_failure", "something broke");
            tracing::warn!(error_type = "layer_test_failure", "not counted");
        });

        let after = ERROR_EVENTS
            .with_label_values(&["layer_test_failure"])
            .get();
        assert_eq!(after - before, 1);
    }
}
