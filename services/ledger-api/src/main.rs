use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

mod error;
mod handlers;
mod http_middleware;
mod state;

use originseal_core::config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    originseal_core::logging::init();

    let config = Config::from_env()?;
    let port = config.port;
    let state = Arc::new(AppState::new(config)?);

    let cors = build_cors_layer(&state.config.cors_allow_origins);

    let verifier_routes = Router::new()
        .route("/api/v1/verify", post(handlers::verify))
        .route("/api/v1/ledger/lookup", post(handlers::lookup))
        .route("/api/v1/certs/:cert_hash", get(handlers::get_cert))
        .layer(axum::middleware::from_fn(http_middleware::verifier_response_headers));

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/device/enroll", post(handlers::enroll))
        .route("/lock-proof", post(handlers::lock_proof))
        .merge(verifier_routes)
        .layer(
            ServiceBuilder::new()
                .layer(cors)
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    http_middleware::enforce_tls,
                )),
        )
        .with_state(state.clone());

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&bind_addr).await?;
    info!(address = %bind_addr, "ledger API listening");

    axum::serve(listener, app).await?;
    Ok(())
}

fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let origins: Vec<_> = allowed_origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new().allow_origin(AllowOrigin::list(origins))
}
