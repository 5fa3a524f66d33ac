//! Checkout API Client

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use pix_core::wire::{
    CreatePaymentRequest, CreatePaymentResponse, ErrorResponse, MessageResponse,
    PaymentStatusResponse, SendEmailRequest,
};

use crate::error::{ClientError, Result};
use crate::session::now_ms;

/// Server endpoints the checkout uses
///
/// Futures are `Send` on native targets so tokio drivers can spawn them.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait CheckoutApi {
    async fn create_payment(&self, request: &CreatePaymentRequest)
    -> Result<CreatePaymentResponse>;

    async fn payment_status(&self, payment_id: &str) -> Result<PaymentStatusResponse>;

    async fn send_confirmation_email(&self, request: &SendEmailRequest)
    -> Result<MessageResponse>;
}

/// HTTP implementation against the checkout server
#[derive(Clone, Debug)]
pub struct HttpCheckoutApi {
    client: Client,
    base_url: String,
}

impl HttpCheckoutApi {
    /// `base_url` is the server origin, e.g. `http://localhost:3000`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

async fn read<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorResponse>(&text) {
        Ok(body) => match body.message {
            Some(detail) => format!("{} ({detail})", body.error),
            None => body.error,
        },
        Err(_) if text.is_empty() => status.to_string(),
        Err(_) => text,
    };

    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl CheckoutApi for HttpCheckoutApi {
    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<CreatePaymentResponse> {
        let response = self
            .client
            .post(self.url("/api/create-payment"))
            .json(request)
            .send()
            .await?;
        read(response).await
    }

    async fn payment_status(&self, payment_id: &str) -> Result<PaymentStatusResponse> {
        // Timestamp defeats intermediary caches
        let response = self
            .client
            .get(self.url(&format!("/api/payment-status/{payment_id}")))
            .query(&[("t", now_ms())])
            .send()
            .await?;
        read(response).await
    }

    async fn send_confirmation_email(
        &self,
        request: &SendEmailRequest,
    ) -> Result<MessageResponse> {
        let response = self
            .client
            .post(self.url("/api/send-confirmation-email"))
            .json(request)
            .send()
            .await?;
        read(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let api = HttpCheckoutApi::new("http://localhost:3000/");
        assert_eq!(api.base_url(), "http://localhost:3000");
        assert_eq!(
            api.url("/api/create-payment"),
            "http://localhost:3000/api/create-payment"
        );
    }
}
