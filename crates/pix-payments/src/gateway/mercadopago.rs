//! Mercado Pago Gateway
//!
//! Implementation of `PaymentGateway` over the Mercado Pago payments REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pix_core::PaymentStatus;

use super::{PaymentDetails, PaymentGateway, PixPayment, PixPaymentRequest, validate_payment_id};
use crate::error::{PaymentError, Result};

const DEFAULT_API_URL: &str = "https://api.mercadopago.com";

/// Mercado Pago configuration
#[derive(Clone, Debug)]
pub struct MercadoPagoConfig {
    /// Private access token (`APP_USR-...` or `TEST-...`)
    pub access_token: String,

    /// API base URL
    pub api_url: String,

    /// Timeout for every gateway call
    pub timeout: Duration,
}

impl MercadoPagoConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            api_url: DEFAULT_API_URL.into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let access_token = std::env::var("MERCADOPAGO_ACCESS_TOKEN")
            .map_err(|_| PaymentError::Config("MERCADOPAGO_ACCESS_TOKEN not set".into()))?;
        let api_url = std::env::var("MERCADOPAGO_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let timeout = std::env::var("GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map_or(Duration::from_secs(10), Duration::from_secs);

        Ok(Self {
            access_token,
            api_url,
            timeout,
        })
    }
}

/// Mercado Pago client
pub struct MercadoPagoClient {
    client: Client,
    config: MercadoPagoConfig,
}

impl MercadoPagoClient {
    /// Create from configuration
    pub fn from_config(config: MercadoPagoConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(MercadoPagoConfig::from_env()?)
    }

    fn payments_url(&self) -> String {
        format!("{}/v1/payments", self.config.api_url.trim_end_matches('/'))
    }

    /// URL of a single payment; the id is checked and pushed as one path segment
    fn payment_url(&self, payment_id: &str) -> Result<Url> {
        validate_payment_id(payment_id)?;

        let mut url = Url::parse(&self.payments_url())
            .map_err(|e| PaymentError::Config(format!("invalid MERCADOPAGO_API_URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| PaymentError::Config("MERCADOPAGO_API_URL cannot be a base".into()))?
            .push(payment_id);
        Ok(url)
    }

    /// Turn a non-2xx answer into a gateway error carrying its message
    async fn error_from(response: reqwest::Response) -> PaymentError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiError>(&body)
            .ok()
            .and_then(|e| e.message.or(e.error))
            .unwrap_or(body);

        if status == StatusCode::NOT_FOUND {
            PaymentError::Gateway(format!("payment not found: {message}"))
        } else {
            PaymentError::Gateway(format!("{status}: {message}"))
        }
    }
}

#[async_trait]
impl PaymentGateway for MercadoPagoClient {
    async fn create_payment(&self, request: &PixPaymentRequest) -> Result<PixPayment> {
        let body = CreatePaymentBody {
            transaction_amount: request.amount,
            description: &request.description,
            payment_method_id: "pix",
            payer: PayerBody {
                email: request.email.as_str(),
            },
        };

        tracing::info!(
            email = %request.email,
            amount = %request.amount,
            "Creating PIX payment"
        );

        let response = self
            .client
            .post(self.payments_url())
            .bearer_auth(&self.config.access_token)
            .header("X-Idempotency-Key", uuid::Uuid::new_v4().to_string())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let payment: ApiPayment = response.json().await?;
        let transaction = payment
            .point_of_interaction
            .and_then(|p| p.transaction_data)
            .unwrap_or_default();

        tracing::info!(payment_id = %payment.id, status = %payment.status, "PIX payment created");

        Ok(PixPayment {
            id: payment.id,
            qr_code: transaction.qr_code,
            qr_code_base64: transaction.qr_code_base64,
            status: PaymentStatus::from(payment.status),
        })
    }

    async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetails> {
        let response = self
            .client
            .get(self.payment_url(payment_id)?)
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let payment: ApiPayment = response.json().await?;

        Ok(PaymentDetails {
            id: payment.id,
            status: PaymentStatus::from(payment.status),
            status_detail: payment.status_detail,
            payer_email: payment.payer.and_then(|p| p.email),
        })
    }

    fn name(&self) -> &str {
        "MercadoPago"
    }
}

#[derive(Serialize)]
struct CreatePaymentBody<'a> {
    #[serde(with = "rust_decimal::serde::float")]
    transaction_amount: Decimal,
    description: &'a str,
    payment_method_id: &'a str,
    payer: PayerBody<'a>,
}

#[derive(Serialize)]
struct PayerBody<'a> {
    email: &'a str,
}

#[derive(Deserialize)]
struct ApiPayment {
    #[serde(deserialize_with = "pix_core::wire::id_string")]
    id: String,
    status: String,
    #[serde(default)]
    status_detail: Option<String>,
    #[serde(default)]
    payer: Option<ApiPayer>,
    #[serde(default)]
    point_of_interaction: Option<ApiPointOfInteraction>,
}

#[derive(Deserialize)]
struct ApiPayer {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct ApiPointOfInteraction {
    #[serde(default)]
    transaction_data: Option<ApiTransactionData>,
}

#[derive(Default, Deserialize)]
struct ApiTransactionData {
    #[serde(default)]
    qr_code: Option<String>,
    #[serde(default)]
    qr_code_base64: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pix_core::EmailAddress;
    use rust_decimal_macros::dec;

    #[test]
    fn test_config_defaults() {
        let config = MercadoPagoConfig::new("TEST-token");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_create_body_sends_amount_as_number() {
        let email = EmailAddress::parse("a@b.com").unwrap();
        let body = CreatePaymentBody {
            transaction_amount: dec!(0.10),
            description: "PIX payment",
            payment_method_id: "pix",
            payer: PayerBody {
                email: email.as_str(),
            },
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["transaction_amount"], serde_json::json!(0.1));
        assert_eq!(json["payment_method_id"], "pix");
        assert_eq!(json["payer"]["email"], "a@b.com");
    }

    #[test]
    fn test_parses_gateway_payment() {
        let json = r#"{
            "id": 123,
            "status": "pending",
            "status_detail": "pending_waiting_transfer",
            "payer": {"email": "a@b.com"},
            "point_of_interaction": {
                "transaction_data": {"qr_code": "000201", "qr_code_base64": "iVBOR"}
            }
        }"#;

        let payment: ApiPayment = serde_json::from_str(json).unwrap();
        assert_eq!(payment.id, "123");
        assert_eq!(payment.payer.and_then(|p| p.email).as_deref(), Some("a@b.com"));
        let data = payment
            .point_of_interaction
            .and_then(|p| p.transaction_data)
            .unwrap();
        assert_eq!(data.qr_code.as_deref(), Some("000201"));
    }

    #[test]
    fn test_payments_url_tolerates_trailing_slash() {
        let mut config = MercadoPagoConfig::new("TEST-token");
        config.api_url = "http://localhost:9999/".into();
        let client = MercadoPagoClient::from_config(config).unwrap();
        assert_eq!(client.payments_url(), "http://localhost:9999/v1/payments");
        assert_eq!(
            client.payment_url("123").unwrap().as_str(),
            "http://localhost:9999/v1/payments/123"
        );
    }

    #[tokio::test]
    async fn test_lookup_rejects_path_traversal_before_sending() {
        let mut config = MercadoPagoConfig::new("TEST-token");
        // Nothing listens here; a request that went out would fail as a gateway error
        config.api_url = "http://127.0.0.1:9".into();
        let client = MercadoPagoClient::from_config(config).unwrap();

        for id in ["../../users/me?x=", "123/refunds", "123%2F..", ""] {
            let err = client.get_payment(id).await.unwrap_err();
            assert!(matches!(err, PaymentError::InvalidPaymentId(_)), "id {id:?}: {err}");
        }
    }
}
