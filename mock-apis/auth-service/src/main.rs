use clap::Parser;
use mimalloc::MiMalloc;

use mock_apis_common::config::parse_key_list;
use mock_apis_common::observability::{self, LogFormat};
use mock_apis_common::server::{self, ExpectPretty};
use mock_auth_service::keys::DEFAULT_API_KEYS;
use mock_auth_service::rate_limit::{self, SWEEP_INTERVAL};
use mock_auth_service::{AppStateData, SERVICE_NAME, make_router};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[command(version, about = "Mock auth gate with per-key rate limiting")]
struct Args {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3003)]
    port: u16,

    /// Comma-separated list of accepted API keys
    #[arg(long, env = "VALID_API_KEYS", default_value = DEFAULT_API_KEYS)]
    valid_api_keys: String,

    /// Sets the log format used for all service logs.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::default())]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    observability::setup_logs("mock_auth_service", args.log_format)
        .expect_pretty("Failed to set up logs");

    let api_keys = parse_key_list(&args.valid_api_keys);
    if api_keys.is_empty() {
        tracing::warn!("`VALID_API_KEYS` is empty, so every validation will fail with 401");
    }

    tracing::info!("Starting {SERVICE_NAME} on port {}", args.port);
    tracing::info!("├ Valid API keys: {}", api_keys.len());
    tracing::info!("└ Log format: {:?}", args.log_format);

    let state = AppStateData::new(api_keys);
    let sweeper = rate_limit::spawn_sweeper(state.rate_limiter.clone(), SWEEP_INTERVAL);

    server::serve(make_router(state), args.port, SERVICE_NAME)
        .await
        .expect_pretty("Failed to run server");

    sweeper.abort();
}
