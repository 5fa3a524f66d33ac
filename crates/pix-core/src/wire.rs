//! HTTP Wire Types
//!
//! Request and response bodies shared by the server handlers and the client
//! API.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::status::PaymentStatus;

/// Body of `POST /api/create-payment`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    #[serde(default)]
    pub email: String,

    /// Accepted for compatibility; the server charges its configured amount
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount: Option<Decimal>,
}

/// Successful answer to `POST /api/create-payment`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreatePaymentResponse {
    pub success: bool,
    pub payment_id: String,
    /// PIX copy-and-paste code
    pub pix_code: Option<String>,
    /// QR code PNG, base64 encoded
    pub pix_code_base64: Option<String>,
    pub status: PaymentStatus,
}

/// Answer to `GET /api/payment-status/:paymentId`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentStatusResponse {
    pub success: bool,
    pub payment_id: String,
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_detail: Option<String>,
}

/// Body of `POST /api/send-confirmation-email`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SendEmailRequest {
    #[serde(default)]
    pub email: String,

    /// Lets the server skip a send it already made for this payment
    #[serde(
        default,
        deserialize_with = "optional_id_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub payment_id: Option<String>,
}

/// Generic `{success, message}` answer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

/// Error body for 4xx/5xx answers
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body of `POST /api/webhook`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WebhookNotification {
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub data: Option<WebhookData>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WebhookData {
    #[serde(
        default,
        deserialize_with = "optional_id_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
}

impl WebhookNotification {
    /// Payment id when this is a payment notification
    pub fn payment_id(&self) -> Option<&str> {
        if self.kind != "payment" {
            return None;
        }
        self.data_id()
    }

    /// `data.id` whatever the notification type
    pub fn data_id(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.id.as_deref())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

/// Gateway ids arrive as JSON numbers or strings
pub fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

fn optional_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawId>::deserialize(deserializer).map(|raw| raw.map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_webhook_accepts_numeric_id() {
        let n: WebhookNotification =
            serde_json::from_str(r#"{"type":"payment","data":{"id":123}}"#).unwrap();
        assert_eq!(n.payment_id(), Some("123"));

        let s: WebhookNotification =
            serde_json::from_str(r#"{"type":"payment","data":{"id":"456"}}"#).unwrap();
        assert_eq!(s.payment_id(), Some("456"));
    }

    #[test]
    fn test_non_payment_notification_has_no_id() {
        let n: WebhookNotification =
            serde_json::from_str(r#"{"type":"plan","data":{"id":"1"}}"#).unwrap();
        assert_eq!(n.payment_id(), None);

        let empty: WebhookNotification = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.payment_id(), None);
    }

    #[test]
    fn test_payment_notification_without_id() {
        for body in [
            r#"{"type":"payment","data":{}}"#,
            r#"{"type":"payment","data":{"id":null}}"#,
            r#"{"type":"payment","data":null}"#,
        ] {
            let n: WebhookNotification = serde_json::from_str(body).unwrap();
            assert_eq!(n.payment_id(), None, "{body}");
        }
    }

    #[test]
    fn test_create_request_amount_is_optional() {
        let with: CreatePaymentRequest =
            serde_json::from_str(r#"{"email":"a@b.com","amount":0.1}"#).unwrap();
        assert_eq!(with.amount, Some(dec!(0.1)));

        let without: CreatePaymentRequest = serde_json::from_str(r#"{"email":"a@b.com"}"#).unwrap();
        assert!(without.amount.is_none());
    }

    #[test]
    fn test_status_detail_omitted_when_absent() {
        let body = PaymentStatusResponse {
            success: true,
            payment_id: "1".into(),
            status: PaymentStatus::Pending,
            status_detail: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("status_detail").is_none());
        assert_eq!(json["status"], "pending");
    }
}
