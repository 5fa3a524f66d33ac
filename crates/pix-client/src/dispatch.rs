//! Client-Triggered Confirmation Email
//!
//! After the browser sees the approval it asks the server to send the
//! confirmation, retrying with the deployment's backoff. The server
//! deduplicates by payment id, so racing the webhook is harmless.
//!
//! The chain is runtime-agnostic: callers pass the sleep function (tokio
//! natively, a browser timeout in the web app) and cancel by dropping or
//! aborting the future.

use std::future::Future;
use std::time::Duration;

use pix_core::{RetryOutcome, RetryPolicy, wire::SendEmailRequest};

use crate::api::CheckoutApi;
use crate::notify::Notification;

/// How the client-side dispatch ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchReport {
    pub outcome: RetryOutcome,

    /// Shown to the payer; set only when the email could not be sent
    pub notification: Option<Notification>,
}

impl DispatchReport {
    /// One line for logs that have no tracing subscriber (the browser console)
    pub fn summary(&self) -> String {
        match self.outcome {
            RetryOutcome::Succeeded { attempts } => {
                format!("Confirmation email requested after {attempts} attempt(s)")
            }
            RetryOutcome::Exhausted { attempts } => {
                format!("Giving up on confirmation email after {attempts} attempt(s)")
            }
            RetryOutcome::Cancelled { attempts } => {
                format!("Confirmation email cancelled after {attempts} attempt(s)")
            }
        }
    }
}

/// Ask the server to send the confirmation email, retrying per `policy`
pub async fn dispatch_confirmation_email<A, S, F>(
    api: &A,
    request: &SendEmailRequest,
    policy: &RetryPolicy,
    initial_delay: Duration,
    mut sleep: S,
) -> DispatchReport
where
    A: CheckoutApi + ?Sized,
    S: FnMut(Duration) -> F,
    F: Future<Output = ()>,
{
    if !initial_delay.is_zero() {
        sleep(initial_delay).await;
    }

    let total = policy.attempts();
    let mut made = 0;

    for attempt in 1..=total {
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            tracing::debug!(attempt, delay_ms = delay.as_millis(), "Waiting before email retry");
            sleep(delay).await;
        }

        made = attempt;
        match api.send_confirmation_email(request).await {
            Ok(response) if response.success => {
                tracing::info!(to = %request.email, attempt, message = %response.message, "Confirmation email requested");
                return DispatchReport {
                    outcome: RetryOutcome::Succeeded { attempts: attempt },
                    notification: None,
                };
            }
            Ok(response) => {
                tracing::warn!(attempt, message = %response.message, "Server declined confirmation email");
            }
            Err(e) if !e.is_retryable() => {
                tracing::error!(attempt, error = %e, "Confirmation email request rejected");
                break;
            }
            Err(e) => {
                tracing::warn!(attempt, max_attempts = total, error = %e, "Confirmation email request failed");
            }
        }
    }

    tracing::error!(to = %request.email, attempts = made, "Giving up on confirmation email");
    DispatchReport {
        outcome: RetryOutcome::Exhausted { attempts: made },
        notification: Some(Notification::error(support_message(request))),
    }
}

fn support_message(request: &SendEmailRequest) -> String {
    match &request.payment_id {
        Some(id) => format!(
            "Your payment was confirmed but we could not send the email. Please contact support with payment id {id}."
        ),
        None => "Your payment was confirmed but we could not send the email. Please contact support."
            .into(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use pix_core::Deployment;
    use pix_core::wire::{
        CreatePaymentRequest, CreatePaymentResponse, MessageResponse, PaymentStatusResponse,
    };

    use super::*;
    use crate::error::{ClientError, Result};
    use crate::notify::NotificationKind;

    /// Fails the first `failures` email requests
    struct FlakyApi {
        failures: usize,
        status: u16,
        calls: AtomicUsize,
    }

    impl FlakyApi {
        fn new(failures: usize, status: u16) -> Self {
            Self {
                failures,
                status,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CheckoutApi for FlakyApi {
        async fn create_payment(&self, _: &CreatePaymentRequest) -> Result<CreatePaymentResponse> {
            unimplemented!()
        }

        async fn payment_status(&self, _: &str) -> Result<PaymentStatusResponse> {
            unimplemented!()
        }

        async fn send_confirmation_email(&self, _: &SendEmailRequest) -> Result<MessageResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(ClientError::Api {
                    status: self.status,
                    message: "failed".into(),
                });
            }
            Ok(MessageResponse {
                success: true,
                message: "Confirmation email sent".into(),
            })
        }
    }

    fn request() -> SendEmailRequest {
        SendEmailRequest {
            email: "a@b.com".into(),
            payment_id: Some("123".into()),
        }
    }

    fn recording_sleep(
        log: Arc<Mutex<Vec<Duration>>>,
    ) -> impl FnMut(Duration) -> tokio::time::Sleep {
        move |d| {
            log.lock().unwrap().push(d);
            tokio::time::sleep(d)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_twice_then_succeeds() {
        let api = FlakyApi::new(2, 500);
        let sleeps = Arc::new(Mutex::new(Vec::new()));
        let policy = Deployment::Local.email_retry_policy();

        let report = dispatch_confirmation_email(
            &api,
            &request(),
            &policy,
            Duration::ZERO,
            recording_sleep(sleeps.clone()),
        )
        .await;

        assert_eq!(report.outcome, RetryOutcome::Succeeded { attempts: 3 });
        assert_eq!(report.summary(), "Confirmation email requested after 3 attempt(s)");
        assert!(report.notification.is_none());
        assert_eq!(api.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            *sleeps.lock().unwrap(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_notifies() {
        let api = FlakyApi::new(10, 503);
        let sleeps = Arc::new(Mutex::new(Vec::new()));
        let policy = RetryPolicy::exponential(3, Duration::from_secs(1));

        let report = dispatch_confirmation_email(
            &api,
            &request(),
            &policy,
            Duration::from_secs(2),
            recording_sleep(sleeps.clone()),
        )
        .await;

        assert_eq!(report.outcome, RetryOutcome::Exhausted { attempts: 3 });
        assert_eq!(report.summary(), "Giving up on confirmation email after 3 attempt(s)");
        assert_eq!(api.calls.load(Ordering::SeqCst), 3);
        let notification = report.notification.unwrap();
        assert_eq!(notification.kind, NotificationKind::Error);
        assert!(notification.message.contains("123"));
        // Initial grace delay, then the backoff
        assert_eq!(
            *sleeps.lock().unwrap(),
            vec![
                Duration::from_secs(2),
                Duration::from_secs(1),
                Duration::from_secs(2)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_stops_retrying() {
        let api = FlakyApi::new(10, 400);
        let policy = RetryPolicy::exponential(3, Duration::from_secs(1));

        let report =
            dispatch_confirmation_email(&api, &request(), &policy, Duration::ZERO, tokio::time::sleep)
                .await;

        assert_eq!(report.outcome, RetryOutcome::Exhausted { attempts: 1 });
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }
}
