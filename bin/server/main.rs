//! Event Registration Server
//!
//! Runs the registration API as a standalone HTTP server.

use anyhow::Result;
use clap::Parser;
use event_registration::config::{
    DEFAULT_RATE_LIMIT_MAX_REQUESTS, DEFAULT_RATE_LIMIT_WINDOW_MS,
};
use event_registration::{run_server, RateLimitConfig, ServerConfig};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "registration-server")]
#[command(about = "Event registration form backend with admin endpoints")]
struct Args {
    /// Server port
    #[arg(short, long, default_value = "3000", env = "PORT")]
    port: u16,

    /// Server host
    #[arg(long, default_value = "0.0.0.0", env = "HOST")]
    host: String,

    /// PostgreSQL connection URL (SQLite under --data-dir when unset)
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Data directory for the SQLite database
    #[arg(short, long, default_value = "./data", env = "DATA_DIR")]
    data_dir: PathBuf,

    /// Rate limit window in milliseconds
    #[arg(long, default_value_t = DEFAULT_RATE_LIMIT_WINDOW_MS, env = "RATE_LIMIT_WINDOW_MS")]
    rate_limit_window_ms: u64,

    /// Registration attempts allowed per window per client
    #[arg(long, default_value_t = DEFAULT_RATE_LIMIT_MAX_REQUESTS, env = "RATE_LIMIT_MAX_REQUESTS")]
    rate_limit_max_requests: u32,

    /// Trust X-Forwarded-For for the client address
    #[arg(long, env = "TRUST_PROXY")]
    trust_proxy: bool,

    /// Allowed CORS origin (any when unset)
    #[arg(long, env = "CORS_ORIGIN")]
    cors_origin: Option<String>,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            database_url: args.database_url,
            data_dir: args.data_dir,
            rate_limit: RateLimitConfig::new(args.rate_limit_window_ms, args.rate_limit_max_requests),
            trust_proxy: args.trust_proxy,
            cors_origin: args.cors_origin,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("event_registration=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .init();

    let config = ServerConfig::from(Args::parse());

    info!("Starting Event Registration Server");
    info!("  Config: {:?}", config);

    run_server(config).await
}
