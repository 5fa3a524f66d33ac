//! PIX Checkout Server

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pix_payments::{
    ConfirmationDispatcher, ConfirmationTemplate, HttpMailer, HttpMailerConfig, LogMailer, Mailer,
    MercadoPagoClient, PaymentGateway,
};
use pix_server::{AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    // Initialize payments
    let gateway: Option<Arc<dyn PaymentGateway>> = match MercadoPagoClient::from_env() {
        Ok(client) => {
            tracing::info!("✓ Mercado Pago configured");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "⚠ Mercado Pago not configured - payments disabled");
            tracing::warn!("  Set MERCADOPAGO_ACCESS_TOKEN in .env");
            None
        }
    };

    // Initialize email delivery
    let mailer: Arc<dyn Mailer> = match HttpMailerConfig::from_env() {
        Some(mailer_config) => {
            tracing::info!(api_url = %mailer_config.api_url, "✓ Email API configured");
            Arc::new(HttpMailer::new(mailer_config)?)
        }
        None => {
            tracing::warn!("⚠ EMAIL_API_KEY not set - confirmation emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    if config.webhook_secret.is_none() {
        tracing::warn!("⚠ MERCADOPAGO_WEBHOOK_SECRET not set - webhook signatures not checked");
    }

    let addr = config.bind_addr.clone();
    let resolution = config.status_resolution;
    let state = AppState::new(config, gateway, mailer, ConfirmationTemplate::from_env());
    let dispatcher = state.dispatcher.clone();
    let app = pix_server::app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 pix-checkout server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Status resolution: {}", resolution.as_str());
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                          - Health check");
    tracing::info!("  POST /api/create-payment              - Create PIX payment");
    tracing::info!("  GET  /api/payment-status/{{paymentId}}  - Payment status");
    tracing::info!("  POST /api/webhook                     - Gateway notifications");
    tracing::info!("  POST /api/send-confirmation-email     - Confirmation email");
    tracing::info!("  GET  /api/test-email?email=           - Send a test email");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(dispatcher))
        .await?;

    Ok(())
}

async fn shutdown_signal(dispatcher: ConfirmationDispatcher) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down, cancelling pending email retries");
    dispatcher.shutdown();
}
