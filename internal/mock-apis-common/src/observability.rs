use clap::ValueEnum;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Error, ErrorDetails};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Set up logs.
///
/// The filter comes from `RUST_LOG`; without it, the service crate logs at `info` and everything
/// else at `warn`.
pub fn setup_logs(crate_name: &str, format: LogFormat) -> Result<(), Error> {
    let log_level = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{crate_name}=info,mock_apis_common=info,warn").into());

    let registry = tracing_subscriber::registry().with(log_level);
    let result = match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_target(false),
            )
            .try_init(),
    };

    result.map_err(|e| {
        Error::new(ErrorDetails::Observability {
            message: format!("Failed to initialize tracing: {e}"),
        })
    })
}
