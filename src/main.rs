mod client;
mod config;
mod error;
mod handlers;
mod idempotency;
mod metrics;
mod models;
mod rate_limit;
mod redis_rate_limit;
mod router;
mod sanity;
mod state;
mod store;

use clap::Parser; // for cli
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::Args;
use crate::error::ServerError;
use crate::rate_limit::{InMemoryRateLimitStore, RateLimitStore, sweeper};
use crate::redis_rate_limit::RedisRateLimitStore;
use crate::router::{WRITE_PATH, build_router};
use crate::sanity::SanityClient;
use crate::state::AppState;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    dotenvy::dotenv().ok();
    init_tracing();

    // parse cli arguments (falls back to env)
    let args = Args::parse();
    let rule = args.rate_rule();

    let rate_limiter: Arc<dyn RateLimitStore> = match &args.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            tracing::info!("rate limits stored in redis");
            Arc::new(RedisRateLimitStore::new(client, "write-proxy:ratelimit", rule))
        }
        None => {
            let store = Arc::new(InMemoryRateLimitStore::new(rule));
            // spawn the background sweeper
            tokio::spawn(sweeper(store.clone(), args.sweep_interval()));
            tracing::warn!("rate limits are process-local; not shared across instances");
            store
        }
    };

    let api_host = args
        .sanity_api_host
        .clone()
        .unwrap_or_else(|| SanityClient::default_api_host(&args.sanity_project_id));
    let sanity = SanityClient::new(
        reqwest::Client::builder().build()?,
        &api_host,
        &args.sanity_api_version,
        &args.sanity_dataset,
        args.sanity_write_token.clone(),
    );

    let state = Arc::new(AppState::new(rate_limiter, Arc::new(sanity)));
    let app = build_router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

    tracing::info!(%addr, path = WRITE_PATH, "write proxy listening");
    tracing::info!(
        project = %args.sanity_project_id,
        dataset = %args.sanity_dataset,
        "forwarding to sanity"
    );
    tracing::info!(
        max_requests = rule.max_requests,
        window_secs = rule.window.as_secs(),
        "rate limit"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
