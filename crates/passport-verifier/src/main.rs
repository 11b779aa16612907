//! Passport Verifier Server Binary
//!
//! Runs the HTTP verification service.

use std::env;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use passport_verifier::{config, create_router, AppState, Verifier, VerifierConfig};

#[tokio::main]
async fn main() {
    // Initialize logging
    let log_level = env::var("PASSPORT_LOG_LEVEL").unwrap_or_else(|_| "info".into());
    let filter = EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    // Configuration
    let port = match config::server_port_from_env() {
        Ok(port) => port,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(2);
        }
    };

    let config = match VerifierConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(2);
        }
    };

    let verifier = match Verifier::from_config(config) {
        Ok(verifier) => verifier,
        Err(e) => {
            error!(error = %e, "Failed to initialize verifier");
            std::process::exit(2);
        }
    };

    info!(
        port = port,
        version = passport_core::version(),
        "Starting passport verifier"
    );

    // Create application state
    let state = Arc::new(AppState { verifier });

    // Build router
    let app = create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    info!(addr = %addr, "Passport verifier listening");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
