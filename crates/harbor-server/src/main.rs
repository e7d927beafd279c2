//! Harbor Server - hybrid land/sea navigation backend

use anyhow::Result;
use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use harbor_core::RoadRouter;
use harbor_server::config::{env_flag, Config};
use harbor_server::road_client::OsrmClient;
use harbor_server::state::AppState;
use harbor_server::{api, loops, persistence};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("harbor_server=debug".parse()?)
        .add_directive("harbor_core=info".parse()?);
    if env_flag("HARBOR_LOG_JSON") {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(filter)
            .init();
    }

    tracing::info!("Starting Harbor Server...");

    let config = Config::from_env();
    let problems = config.validate();
    if !problems.is_empty() {
        anyhow::bail!("invalid configuration: {}", problems.join("; "));
    }

    let db = persistence::init_database(&config.database_path, config.database_max_connections).await?;
    let road: Arc<dyn RoadRouter> = Arc::new(OsrmClient::new(&config)?);
    let state = Arc::new(AppState::bootstrap(config.clone(), db, road).await?);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let prune_task = tokio::spawn(loops::weather_prune_loop::run_weather_prune_loop(
        state.weather().clone(),
        Duration::from_secs(config.weather_prune_interval_s),
        shutdown_tx.subscribe(),
    ));

    let app = api::routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(());
    let _ = prune_task.await;
    Ok(())
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
