//! Application State

use std::sync::Arc;

use pix_payments::{
    ConfirmationDispatcher, ConfirmationTemplate, Mailer, MemoryStatusCache, PaymentGateway,
    StatusCache, StatusResolver, WebhookHandler,
};

use crate::config::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,

    /// Payment gateway (optional - None if not configured)
    pub gateway: Option<Arc<dyn PaymentGateway>>,

    /// Last-known status per payment id
    pub cache: Arc<dyn StatusCache>,

    /// Confirmation email delivery
    pub dispatcher: ConfirmationDispatcher,

    /// Status endpoint pipeline; needs the gateway
    pub resolver: Option<StatusResolver>,

    /// Webhook processing; needs the gateway
    pub webhooks: Option<WebhookHandler>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        gateway: Option<Arc<dyn PaymentGateway>>,
        mailer: Arc<dyn Mailer>,
        template: ConfirmationTemplate,
    ) -> Self {
        let cache: Arc<dyn StatusCache> = Arc::new(MemoryStatusCache::new());
        let dispatcher = ConfirmationDispatcher::builder(mailer)
            .template(template)
            .policy(config.email_retry.clone())
            .build();

        let resolver = gateway.as_ref().map(|gateway| {
            StatusResolver::new(
                config.status_resolution,
                cache.clone(),
                gateway.clone(),
                dispatcher.clone(),
            )
        });

        let webhooks = gateway.as_ref().map(|gateway| {
            let handler = WebhookHandler::new(gateway.clone(), cache.clone(), dispatcher.clone());
            match &config.webhook_secret {
                Some(secret) => handler.with_secret(secret.clone()),
                None => handler,
            }
        });

        Self {
            config: Arc::new(config),
            gateway,
            cache,
            dispatcher,
            resolver,
            webhooks,
        }
    }
}
