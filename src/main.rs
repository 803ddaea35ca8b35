//! mailgate: resilient email dispatch service.
//!
//! ```text
//!     POST /send-email
//!         │
//!         ▼
//!   ┌───────────┐   ┌──────────────┐   ┌──────────────┐
//!   │   http    │──▶│   security   │──▶│   dispatch   │
//!   │  server   │   │ limits/rate  │   │    engine    │
//!   └───────────┘   └──────────────┘   └──────┬───────┘
//!                                             │ priority order
//!                                ┌────────────┴────────────┐
//!                                ▼                         ▼
//!                        ┌──────────────┐          ┌──────────────┐
//!                        │ breaker (a)  │          │ breaker (b)  │
//!                        │  provider a  │          │  provider b  │
//!                        └──────────────┘          └──────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use mailgate::http::HttpServer;
use mailgate::lifecycle::{signals, startup, Shutdown};
use mailgate::observability::logging;

#[derive(Parser)]
#[command(name = "mailgate", version, about = "Resilient email dispatch service")]
struct Args {
    /// Path to a TOML config file; defaults apply when omitted
    #[arg(short, long, env = "MAILGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listener bind address
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = startup::resolve_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!("mailgate v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        max_retries = config.retries.max_retries,
        "Configuration loaded"
    );

    startup::start_metrics(&config);
    let engine = startup::build_engine(&config);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let _signals = signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(&config, engine);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
