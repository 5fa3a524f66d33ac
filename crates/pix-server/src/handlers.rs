//! HTTP Handlers

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pix_core::{
    CoreError, EmailAddress,
    wire::{
        CreatePaymentRequest, CreatePaymentResponse, ErrorResponse, MessageResponse,
        PaymentStatusResponse, SendEmailRequest, WebhookNotification,
    },
};
use pix_payments::{
    PaymentError, PaymentGateway, PixPaymentRequest, ResolvedStatus, SendOutcome, WebhookOutcome,
    validate_payment_id,
};

use crate::state::AppState;

// ============================================================================
// Errors
// ============================================================================

/// Handler error, rendered as `(status, ErrorResponse)`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Payments not configured")]
    PaymentsDisabled,

    #[error(transparent)]
    Validation(#[from] CoreError),

    #[error(transparent)]
    Payment(PaymentError),
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Validation(e) => Self::Validation(e),
            other => Self::Payment(other),
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::PaymentsDisabled => StatusCode::SERVICE_UNAVAILABLE,
            Self::Validation(_) | Self::Payment(PaymentError::InvalidPaymentId(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Payment(PaymentError::WebhookSignature(_)) => StatusCode::UNAUTHORIZED,
            Self::Payment(PaymentError::RecipientMismatch(_)) => StatusCode::FORBIDDEN,
            Self::Payment(PaymentError::NotApproved(_)) => StatusCode::CONFLICT,
            Self::Payment(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::PaymentsDisabled => "PAYMENTS_DISABLED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Payment(e) => match e {
                PaymentError::Gateway(_) | PaymentError::GatewayResponse(_) => "GATEWAY_ERROR",
                PaymentError::EmailDelivery(_) => "EMAIL_ERROR",
                PaymentError::WebhookSignature(_) => "INVALID_SIGNATURE",
                PaymentError::InvalidPaymentId(_) => "INVALID_PAYMENT_ID",
                PaymentError::NotApproved(_) => "PAYMENT_NOT_APPROVED",
                PaymentError::RecipientMismatch(_) => "EMAIL_MISMATCH",
                PaymentError::Validation(_) => "VALIDATION_ERROR",
                PaymentError::Config(_) => "CONFIG_ERROR",
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::PaymentsDisabled => ErrorResponse {
                error: self.to_string(),
                code: self.code().into(),
                message: None,
            },
            Self::Validation(e) => ErrorResponse {
                error: e.user_message().into(),
                code: self.code().into(),
                message: None,
            },
            Self::Payment(e) if status.is_client_error() => ErrorResponse {
                error: e.user_message().into(),
                code: self.code().into(),
                message: None,
            },
            Self::Payment(e) => ErrorResponse {
                error: e.user_message().into(),
                code: self.code().into(),
                message: Some(e.to_string()),
            },
        };

        if status.is_server_error() {
            tracing::error!(status = %status, code = %body.code, error = %self, "Request failed");
        } else {
            tracing::warn!(status = %status, code = %body.code, error = %self, "Request rejected");
        }

        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn gateway(state: &AppState) -> ApiResult<&dyn PaymentGateway> {
    state.gateway.as_deref().ok_or(ApiError::PaymentsDisabled)
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub gateway: Option<String>,
    pub mailer: String,
    pub status_resolution: String,
}

#[derive(Debug, Deserialize)]
pub struct TestEmailQuery {
    #[serde(default)]
    pub email: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        gateway: state.gateway.as_ref().map(|g| g.name().to_string()),
        mailer: state.dispatcher.mailer_name().to_string(),
        status_resolution: state.config.status_resolution.as_str().into(),
    })
}

/// Create a PIX payment for the payer email
pub async fn create_payment(
    State(state): State<AppState>,
    Json(payload): Json<CreatePaymentRequest>,
) -> ApiResult<Json<CreatePaymentResponse>> {
    let email = EmailAddress::parse(&payload.email)?;
    let gateway = gateway(&state)?;

    let amount = state.config.amount;
    if let Some(requested) = payload.amount.filter(|requested| *requested != amount) {
        tracing::warn!(
            requested = %requested,
            charged = %amount,
            "Ignoring client-supplied amount"
        );
    }

    let request = PixPaymentRequest {
        description: format!("{} - {}", state.config.description, email),
        email,
        amount,
    };

    tracing::info!(email = %request.email, amount = %amount, "Creating PIX payment");
    let payment = gateway.create_payment(&request).await?;
    state.cache.set(&payment.id, payment.status.clone());

    tracing::info!(payment_id = %payment.id, status = %payment.status, "PIX payment created");

    Ok(Json(CreatePaymentResponse {
        success: true,
        payment_id: payment.id,
        pix_code: payment.qr_code,
        pix_code_base64: payment.qr_code_base64,
        status: payment.status,
    }))
}

/// Current status of a payment; the `t` query parameter is a cache buster
pub async fn payment_status(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let resolved = match &state.resolver {
        Some(resolver) => resolver.resolve(&payment_id).await?,
        None => ResolvedStatus {
            status: state.cache.get(&payment_id),
            status_detail: None,
        },
    };

    tracing::debug!(payment_id = %payment_id, status = %resolved.status, "Payment status queried");

    Ok((
        [(header::CACHE_CONTROL, "no-store")],
        Json(PaymentStatusResponse {
            success: true,
            payment_id,
            status: resolved.status,
            status_detail: resolved.status_detail,
        }),
    ))
}

/// Gateway webhook receiver
///
/// Bodies we cannot read are acknowledged so the gateway does not keep
/// redelivering them.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let handler = state.webhooks.as_ref().ok_or(ApiError::PaymentsDisabled)?;

    let notification = match serde_json::from_slice::<WebhookNotification>(&body) {
        Ok(notification) => notification,
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable webhook body acknowledged");
            return Ok(StatusCode::OK);
        }
    };

    if let Some(data_id) = notification.data_id() {
        handler.verify(
            header_str(&headers, "x-signature"),
            header_str(&headers, "x-request-id"),
            data_id,
        )?;
    }

    match handler.handle(&notification).await? {
        WebhookOutcome::Ignored { kind } => {
            tracing::debug!(kind = %kind, "Webhook acknowledged without processing");
        }
        WebhookOutcome::Updated {
            payment_id,
            confirmation_dispatched,
            ..
        } => {
            tracing::info!(payment_id = %payment_id, confirmation_dispatched, "Webhook processed");
        }
    }

    Ok(StatusCode::OK)
}

/// Client-triggered confirmation email
///
/// With a `payment_id` the gateway must report the payment approved and the
/// email must be the payer's; the delivery ledger is only touched after that.
pub async fn send_confirmation_email(
    State(state): State<AppState>,
    Json(payload): Json<SendEmailRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let email = EmailAddress::parse(&payload.email)?;

    let recipient = match payload.payment_id.as_deref() {
        Some(payment_id) => payer_recipient(&state, payment_id, &email).await?,
        None => email.to_string(),
    };

    let message = match state
        .dispatcher
        .send_for_payment(payload.payment_id.as_deref(), &recipient)
        .await
    {
        SendOutcome::Sent => "Confirmation email sent",
        SendOutcome::AlreadySent => "Confirmation email already sent",
        SendOutcome::Failed => {
            return Err(PaymentError::EmailDelivery(format!("could not send to {email}")).into());
        }
    };

    Ok(Json(MessageResponse {
        success: true,
        message: message.into(),
    }))
}

/// Address the confirmation for `payment_id` may go to
async fn payer_recipient(
    state: &AppState,
    payment_id: &str,
    requested: &EmailAddress,
) -> ApiResult<String> {
    validate_payment_id(payment_id)?;
    let details = gateway(state)?.get_payment(payment_id).await?;

    if !details.status.is_approved() {
        tracing::warn!(
            payment_id = %payment_id,
            status = %details.status,
            "Confirmation requested before approval"
        );
        return Err(PaymentError::NotApproved(payment_id.to_string()).into());
    }

    match details.payer_email {
        Some(payer) if payer.eq_ignore_ascii_case(requested.as_str()) => Ok(payer),
        Some(_) => {
            tracing::warn!(payment_id = %payment_id, "Confirmation requested for another address");
            Err(PaymentError::RecipientMismatch(payment_id.to_string()).into())
        }
        None => Ok(requested.to_string()),
    }
}

/// Send the confirmation template; defaults to the configured test address
pub async fn test_email(
    State(state): State<AppState>,
    Query(query): Query<TestEmailQuery>,
) -> ApiResult<Json<MessageResponse>> {
    let raw = query
        .email
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| state.config.test_email.clone());
    let email = EmailAddress::parse(&raw)?;

    if !state.dispatcher.send(email.as_str()).await {
        return Err(PaymentError::EmailDelivery(format!("could not send to {email}")).into());
    }

    Ok(Json(MessageResponse {
        success: true,
        message: format!("Test email sent to {email}"),
    }))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
