use clap::Parser;
use mimalloc::MiMalloc;

use mock_apis_common::FaultInjector;
use mock_apis_common::config::parse_failure_rate;
use mock_apis_common::observability::{self, LogFormat};
use mock_apis_common::server::{self, ExpectPretty};
use mock_crm_webhook::webhook_log::MAX_LOG_SIZE;
use mock_crm_webhook::{AppStateData, DEFAULT_FAILURE_RATE, SERVICE_NAME, make_router};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[command(version, about = "Mock CRM webhook receiver with idempotency dedup")]
struct Args {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3002)]
    port: u16,

    /// Probability (0 to 1) that a new webhook or contact lookup fails with a 503
    #[arg(long, env = "FAILURE_RATE", default_value_t = DEFAULT_FAILURE_RATE, value_parser = parse_failure_rate)]
    failure_rate: f64,

    /// Seed for the random source, to make a run reproducible
    #[arg(long, env = "RANDOM_SEED")]
    seed: Option<u64>,

    /// Sets the log format used for all service logs.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::default())]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    observability::setup_logs("mock_crm_webhook", args.log_format)
        .expect_pretty("Failed to set up logs");

    tracing::info!("Starting {SERVICE_NAME} on port {}", args.port);
    tracing::info!("├ Failure rate: {}%", args.failure_rate * 100.0);
    tracing::info!("├ Webhook log capacity: {MAX_LOG_SIZE}");
    match args.seed {
        Some(seed) => tracing::info!("├ Random seed: {seed}"),
        None => tracing::info!("├ Random seed: none"),
    }
    tracing::info!("└ Log format: {:?}", args.log_format);

    let state = AppStateData::new(FaultInjector::from_seed(args.failure_rate, args.seed));

    server::serve(make_router(state), args.port, SERVICE_NAME)
        .await
        .expect_pretty("Failed to run server");
}
