use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use boxoffice::{config::Config, controllers, AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Boxoffice API");

    let app_state = AppState::new(config.clone())
        .await
        .expect("Failed to initialize application state");
    info!("Database and Redis connected");

    // --- Start background tasks ---

    // Reclaim seats whose admin locks have outlived their TTL. The lock
    // store expires its own keys; this loop brings the relational rows
    // back in line with it.
    let reclaimer = app_state.reclaimer.clone();
    let interval = Duration::from_secs(config.locks.reclaim_interval_seconds);
    task::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            match reclaimer.release_expired().await {
                Ok(outcome) if outcome.released_count > 0 => {
                    info!(
                        released = outcome.released_count,
                        "Reclaimed expired seat locks"
                    );
                }
                Ok(_) => {}
                Err(e) => error!("Expired lock reclaim failed: {}", e),
            }
        }
    });

    // --- Start the web server ---

    let app = Router::new()
        .route("/", get(|| async { "Boxoffice API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.app.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server address");
    axum::serve(listener, app.into_make_service())
        .await
        .expect("Server error");
}
