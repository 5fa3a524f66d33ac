//! Tokio Drivers
//!
//! Native drivers for the poller and the confirmation email dispatch. Each
//! keeps the `JoinHandle` of its task so a restart or reset aborts the old
//! timer before arming a new one.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use pix_core::{RetryPolicy, wire::SendEmailRequest};

use crate::api::CheckoutApi;
use crate::dispatch::{DispatchReport, dispatch_confirmation_email};
use crate::poller::{PollEvent, PollState, PollerCore};

/// Interval-driven status poller
pub struct Poller<A> {
    api: Arc<A>,
    interval: Duration,
    core: Arc<Mutex<PollerCore>>,
    timer: Option<JoinHandle<()>>,
    confirmations: mpsc::UnboundedSender<String>,
}

impl<A> Poller<A>
where
    A: CheckoutApi + Send + Sync + 'static,
{
    /// The receiver yields each confirmed payment id exactly once
    pub fn new(api: Arc<A>, interval: Duration) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (confirmations, rx) = mpsc::unbounded_channel();
        let poller = Self {
            api,
            interval,
            core: Arc::new(Mutex::new(PollerCore::new())),
            timer: None,
            confirmations,
        };
        (poller, rx)
    }

    pub fn state(&self) -> PollState {
        self.core
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state()
            .clone()
    }

    /// True while a timer task is alive
    pub fn is_active(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }

    /// Poll `payment_id`, replacing any running timer
    pub fn start(&mut self, payment_id: &str) {
        self.cancel_timer();

        let generation = self
            .core
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .start(payment_id);

        let api = self.api.clone();
        let core = self.core.clone();
        let confirmations = self.confirmations.clone();
        let interval = self.interval;
        let payment_id = payment_id.to_string();

        self.timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let status = match api.payment_status(&payment_id).await {
                    Ok(response) => response.status,
                    Err(e) => {
                        tracing::warn!(payment_id = %payment_id, error = %e, "Status check failed, will retry");
                        continue;
                    }
                };

                let event = core
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .observe(generation, &status);

                match event {
                    PollEvent::Continue => {}
                    PollEvent::Confirmed { payment_id } => {
                        if confirmations.send(payment_id).is_err() {
                            tracing::debug!("Confirmation receiver dropped");
                        }
                        break;
                    }
                    PollEvent::Ignored => break,
                }
            }
        }));
    }

    /// Stop polling and forget the payment
    pub fn reset(&mut self) {
        self.cancel_timer();
        self.core
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl<A> Drop for Poller<A> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Run the confirmation email chain on a background task; abort the
/// handle to cancel it
pub fn spawn_confirmation_email<A>(
    api: Arc<A>,
    request: SendEmailRequest,
    policy: RetryPolicy,
    initial_delay: Duration,
) -> JoinHandle<DispatchReport>
where
    A: CheckoutApi + Send + Sync + 'static,
{
    tokio::spawn(async move {
        dispatch_confirmation_email(
            api.as_ref(),
            &request,
            &policy,
            initial_delay,
            tokio::time::sleep,
        )
        .await
    })
}
