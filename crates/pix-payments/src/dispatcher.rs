//! Confirmation Email Dispatcher
//!
//! Sends the confirmation email with a bounded retry chain. Chains run on
//! background tasks and are owned by a [`RetryHandle`] that can cancel them
//! while they wait between attempts.
//!
//! Approval can be observed by the webhook, by a direct status lookup and by
//! the browser at roughly the same time. The [`DeliveryLedger`] keys sends by
//! payment id so only the first trigger delivers; a failed chain releases its
//! key so a later trigger can try again.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use pix_core::{RetryOutcome, RetryPolicy};

use crate::mailer::{ConfirmationTemplate, Mailer};

/// Payment ids whose confirmation is sent or being sent
#[derive(Debug, Default)]
pub struct DeliveryLedger {
    claimed: Mutex<HashSet<String>>,
}

impl DeliveryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the id was newly claimed, false for a duplicate
    pub fn claim(&self, payment_id: &str) -> bool {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(payment_id.to_string())
    }

    /// Forget a claim so the next trigger sends again
    pub fn release(&self, payment_id: &str) {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(payment_id);
    }

    pub fn contains(&self, payment_id: &str) -> bool {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(payment_id)
    }
}

/// Handle to a scheduled retry chain
pub struct RetryHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<RetryOutcome>,
    attempts: Arc<AtomicU32>,
}

impl RetryHandle {
    /// Stop the chain; an attempt already in flight still completes
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Transport calls made so far
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Wait for the chain to end
    pub async fn outcome(self) -> RetryOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "Retry task did not complete");
                RetryOutcome::Cancelled {
                    attempts: self.attempts.load(Ordering::SeqCst),
                }
            }
        }
    }
}

/// Result of triggering the confirmation for a payment
pub enum ConfirmationDispatch {
    /// A retry chain is now delivering the email
    Scheduled(RetryHandle),

    /// Another trigger already sent (or is sending) this confirmation
    Duplicate,
}

/// Result of a single inline send
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    AlreadySent,
    Failed,
}

struct Inner {
    mailer: Arc<dyn Mailer>,
    template: ConfirmationTemplate,
    policy: RetryPolicy,
    ledger: DeliveryLedger,
    shutdown: watch::Sender<bool>,
}

/// Confirmation email dispatcher
#[derive(Clone)]
pub struct ConfirmationDispatcher {
    inner: Arc<Inner>,
}

/// Builder for [`ConfirmationDispatcher`]
pub struct DispatcherBuilder {
    mailer: Arc<dyn Mailer>,
    template: ConfirmationTemplate,
    policy: RetryPolicy,
}

impl DispatcherBuilder {
    #[must_use]
    pub fn template(mut self, template: ConfirmationTemplate) -> Self {
        self.template = template;
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> ConfirmationDispatcher {
        let (shutdown, _) = watch::channel(false);
        ConfirmationDispatcher {
            inner: Arc::new(Inner {
                mailer: self.mailer,
                template: self.template,
                policy: self.policy,
                ledger: DeliveryLedger::new(),
                shutdown,
            }),
        }
    }
}

impl ConfirmationDispatcher {
    pub fn builder(mailer: Arc<dyn Mailer>) -> DispatcherBuilder {
        DispatcherBuilder {
            mailer,
            template: ConfirmationTemplate::default(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.inner.policy
    }

    pub fn mailer_name(&self) -> &str {
        self.inner.mailer.name()
    }

    pub fn ledger(&self) -> &DeliveryLedger {
        &self.inner.ledger
    }

    /// Single attempt; never errors to the caller
    pub async fn send(&self, email: &str) -> bool {
        tracing::info!(to = %email, "Sending confirmation email");
        let message = self.inner.template.render(email);

        match self.inner.mailer.send(&message).await {
            Ok(()) => {
                tracing::info!(to = %email, "Confirmation email sent");
                true
            }
            Err(e) => {
                tracing::error!(to = %email, error = %e, "Confirmation email failed");
                false
            }
        }
    }

    /// Single attempt, skipped when the payment was already confirmed
    pub async fn send_for_payment(&self, payment_id: Option<&str>, email: &str) -> SendOutcome {
        let Some(payment_id) = payment_id else {
            return if self.send(email).await {
                SendOutcome::Sent
            } else {
                SendOutcome::Failed
            };
        };

        if !self.inner.ledger.claim(payment_id) {
            tracing::info!(
                payment_id = %payment_id,
                "Confirmation already sent for payment, skipping"
            );
            return SendOutcome::AlreadySent;
        }

        if self.send(email).await {
            SendOutcome::Sent
        } else {
            self.inner.ledger.release(payment_id);
            SendOutcome::Failed
        }
    }

    /// Run the full retry chain inline
    pub async fn deliver(&self, email: &str) -> RetryOutcome {
        let (_cancel, cancel_rx) = watch::channel(false);
        run_chain(
            self.inner.clone(),
            email.to_string(),
            cancel_rx,
            Arc::new(AtomicU32::new(0)),
        )
        .await
    }

    /// Run the retry chain on a background task
    pub fn schedule(&self, email: &str) -> RetryHandle {
        self.spawn_chain(email, None)
    }

    /// Deliver the confirmation for an approved payment at most once
    pub fn confirm_payment(&self, payment_id: &str, email: &str) -> ConfirmationDispatch {
        if !self.inner.ledger.claim(payment_id) {
            tracing::debug!(payment_id = %payment_id, "Confirmation already dispatched");
            return ConfirmationDispatch::Duplicate;
        }

        tracing::info!(payment_id = %payment_id, to = %email, "Dispatching payment confirmation");
        ConfirmationDispatch::Scheduled(self.spawn_chain(email, Some(payment_id.to_string())))
    }

    /// Cancel every chain still waiting for its next attempt
    pub fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
    }

    fn spawn_chain(&self, email: &str, payment_id: Option<String>) -> RetryHandle {
        let (cancel, cancel_rx) = watch::channel(false);
        let attempts = Arc::new(AtomicU32::new(0));
        let inner = self.inner.clone();
        let email = email.to_string();
        let counter = attempts.clone();

        let task = tokio::spawn(async move {
            let outcome = run_chain(inner.clone(), email, cancel_rx, counter).await;
            if let Some(id) = payment_id {
                if !outcome.is_success() {
                    inner.ledger.release(&id);
                }
            }
            outcome
        });

        RetryHandle {
            cancel,
            task,
            attempts,
        }
    }
}

async fn run_chain(
    inner: Arc<Inner>,
    email: String,
    mut cancel: watch::Receiver<bool>,
    attempts: Arc<AtomicU32>,
) -> RetryOutcome {
    let mut shutdown = inner.shutdown.subscribe();
    let message = inner.template.render(&email);
    let total = inner.policy.attempts();

    for attempt in 1..=total {
        let delay = inner.policy.delay_before(attempt);
        let made = attempt - 1;

        if !delay.is_zero() {
            tracing::debug!(to = %email, attempt, delay_ms = delay.as_millis(), "Waiting before retry");
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancelled(&mut cancel) => return RetryOutcome::Cancelled { attempts: made },
                () = cancelled(&mut shutdown) => return RetryOutcome::Cancelled { attempts: made },
            }
        }

        if *cancel.borrow() || *shutdown.borrow() {
            return RetryOutcome::Cancelled { attempts: made };
        }

        attempts.store(attempt, Ordering::SeqCst);
        match inner.mailer.send(&message).await {
            Ok(()) => {
                tracing::info!(to = %email, attempt, "Confirmation email sent");
                return RetryOutcome::Succeeded { attempts: attempt };
            }
            Err(e) => {
                tracing::warn!(to = %email, attempt, max_attempts = total, error = %e, "Confirmation email attempt failed");
            }
        }
    }

    tracing::error!(to = %email, attempts = total, "Confirmation email retries exhausted");
    RetryOutcome::Exhausted { attempts: total }
}

/// Resolves once the flag is raised; never resolves if the sender is gone
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::MemoryMailer;
    use std::time::Duration;

    fn dispatcher(mailer: Arc<MemoryMailer>, policy: RetryPolicy) -> ConfirmationDispatcher {
        ConfirmationDispatcher::builder(mailer).policy(policy).build()
    }

    #[test]
    fn test_ledger_claims_once() {
        let ledger = DeliveryLedger::new();
        assert!(ledger.claim("1"));
        assert!(!ledger.claim("1"));
        ledger.release("1");
        assert!(ledger.claim("1"));
    }

    #[tokio::test]
    async fn test_send_reports_failure_without_error() {
        let mailer = Arc::new(MemoryMailer::failing(1));
        let d = dispatcher(mailer.clone(), RetryPolicy::none());

        assert!(!d.send("a@b.com").await);
        assert!(d.send("a@b.com").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_succeeds_on_third_attempt() {
        let mailer = Arc::new(MemoryMailer::failing(2));
        let d = dispatcher(mailer.clone(), RetryPolicy::exponential(3, Duration::from_secs(1)));

        let start = tokio::time::Instant::now();
        let outcome = d.deliver("a@b.com").await;

        assert_eq!(outcome, RetryOutcome::Succeeded { attempts: 3 });
        assert_eq!(mailer.attempts(), 3);
        // 1s before the second attempt, 2s before the third
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_bounded_by_policy() {
        let mailer = Arc::new(MemoryMailer::failing(10));
        let d = dispatcher(mailer.clone(), RetryPolicy::exponential(3, Duration::from_secs(1)));

        let outcome = d.schedule("a@b.com").outcome().await;
        assert_eq!(outcome, RetryOutcome::Exhausted { attempts: 3 });
        assert_eq!(mailer.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_pending_retries() {
        let mailer = Arc::new(MemoryMailer::failing(10));
        let d = dispatcher(mailer.clone(), RetryPolicy::exponential(3, Duration::from_secs(10)));

        let handle = d.schedule("a@b.com");
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.attempts(), 1);

        handle.cancel();
        let outcome = handle.outcome().await;
        assert_eq!(outcome, RetryOutcome::Cancelled { attempts: 1 });
        assert_eq!(mailer.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_all_chains() {
        let mailer = Arc::new(MemoryMailer::failing(10));
        let d = dispatcher(mailer.clone(), RetryPolicy::exponential(3, Duration::from_secs(10)));

        let first = d.schedule("a@b.com");
        let second = d.schedule("c@d.com");
        tokio::time::sleep(Duration::from_secs(1)).await;

        d.shutdown();
        assert!(matches!(first.outcome().await, RetryOutcome::Cancelled { .. }));
        assert!(matches!(second.outcome().await, RetryOutcome::Cancelled { .. }));
        assert_eq!(mailer.attempts(), 2);
    }

    #[tokio::test]
    async fn test_confirm_payment_deduplicates() {
        let mailer = Arc::new(MemoryMailer::new());
        let d = dispatcher(mailer.clone(), RetryPolicy::none());

        let ConfirmationDispatch::Scheduled(handle) = d.confirm_payment("123", "a@b.com") else {
            panic!("first confirmation should be scheduled");
        };
        assert!(matches!(d.confirm_payment("123", "a@b.com"), ConfirmationDispatch::Duplicate));

        assert!(handle.outcome().await.is_success());
        assert_eq!(mailer.sent_to(), vec!["a@b.com".to_string()]);
        assert_eq!(
            d.send_for_payment(Some("123"), "a@b.com").await,
            SendOutcome::AlreadySent
        );
    }

    #[tokio::test]
    async fn test_failed_confirmation_releases_claim() {
        let mailer = Arc::new(MemoryMailer::failing(1));
        let d = dispatcher(mailer.clone(), RetryPolicy::none());

        let ConfirmationDispatch::Scheduled(handle) = d.confirm_payment("123", "a@b.com") else {
            panic!("first confirmation should be scheduled");
        };
        assert_eq!(handle.outcome().await, RetryOutcome::Exhausted { attempts: 1 });
        assert!(!d.ledger().contains("123"));

        assert_eq!(d.send_for_payment(Some("123"), "a@b.com").await, SendOutcome::Sent);
    }
}
