//! PIX Checkout HTTP Server
//!
//! Axum router serving the checkout API and the static frontend.

pub mod config;
pub mod handlers;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub use config::ServerConfig;
pub use state::AppState;

use crate::handlers::{
    create_payment, health_check, payment_status, send_confirmation_email, test_email, webhook,
};

/// Build the application router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        // Health
        .route("/health", get(health_check))
        // Checkout API
        .route("/api/create-payment", post(create_payment))
        .route("/api/payment-status/{payment_id}", get(payment_status))
        .route("/api/send-confirmation-email", post(send_confirmation_email))
        .route("/api/test-email", get(test_email))
        // Gateway notifications
        .route("/api/webhook", post(webhook))
        // Static files (WASM frontend)
        .fallback_service(static_files)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
