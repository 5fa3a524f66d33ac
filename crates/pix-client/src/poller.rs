//! Status Poller State Machine
//!
//! ```text
//!   Idle ──start(id)──▶ Polling ──observe(approved)──▶ Confirmed
//!    ▲                     │                              │
//!    └──────reset()────────┴──────────reset()─────────────┘
//! ```
//!
//! The machine owns no timer. Drivers (tokio tasks natively, browser
//! intervals in the web app) cancel their timer whenever [`PollerCore::start`]
//! or [`PollerCore::reset`] is called and act on the [`PollEvent`] returned by
//! [`PollerCore::observe`].

use pix_core::PaymentStatus;

/// Poller state
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PollState {
    #[default]
    Idle,
    Polling { payment_id: String },
    Confirmed { payment_id: String },
}

impl PollState {
    pub fn payment_id(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Polling { payment_id } | Self::Confirmed { payment_id } => Some(payment_id),
        }
    }
}

/// What a status observation means for the driver
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollEvent {
    /// Keep the timer running
    Continue,

    /// First approval: stop the timer, render success, dispatch the email
    Confirmed { payment_id: String },

    /// Not polling (late answer after reset or confirmation); do nothing
    Ignored,
}

/// Runtime-independent poller logic
#[derive(Debug, Default)]
pub struct PollerCore {
    state: PollState,
    generation: u64,
}

impl PollerCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn state(&self) -> &PollState {
        &self.state
    }

    pub const fn is_polling(&self) -> bool {
        matches!(self.state, PollState::Polling { .. })
    }

    /// Bumped on every start and reset; answers tagged with an older value
    /// belong to a cancelled timer
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Begin polling a payment, replacing any previous one
    pub fn start(&mut self, payment_id: impl Into<String>) -> u64 {
        let payment_id = payment_id.into();
        tracing::info!(payment_id = %payment_id, "Starting payment status polling");
        self.generation += 1;
        self.state = PollState::Polling { payment_id };
        self.generation
    }

    /// Feed one status answer received by the timer of `generation`
    pub fn observe(&mut self, generation: u64, status: &PaymentStatus) -> PollEvent {
        if generation != self.generation {
            return PollEvent::Ignored;
        }

        let PollState::Polling { payment_id } = &self.state else {
            return PollEvent::Ignored;
        };

        tracing::debug!(payment_id = %payment_id, status = %status, "Payment status polled");
        if !status.is_approved() {
            return PollEvent::Continue;
        }

        let payment_id = payment_id.clone();
        tracing::info!(payment_id = %payment_id, "Payment approved");
        self.state = PollState::Confirmed {
            payment_id: payment_id.clone(),
        };
        PollEvent::Confirmed { payment_id }
    }

    /// Back to idle ("new payment")
    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = PollState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_keeps_polling() {
        let mut core = PollerCore::new();
        let generation = core.start("123");

        assert_eq!(core.observe(generation, &PaymentStatus::Pending), PollEvent::Continue);
        assert_eq!(
            core.observe(generation, &PaymentStatus::from("in_process")),
            PollEvent::Continue
        );
        assert!(core.is_polling());
    }

    #[test]
    fn test_confirms_exactly_once() {
        let mut core = PollerCore::new();
        let generation = core.start("123");

        assert_eq!(
            core.observe(generation, &PaymentStatus::Approved),
            PollEvent::Confirmed {
                payment_id: "123".into()
            }
        );
        assert_eq!(core.observe(generation, &PaymentStatus::Approved), PollEvent::Ignored);
        assert_eq!(core.state().payment_id(), Some("123"));
        assert!(!core.is_polling());
    }

    #[test]
    fn test_answers_from_cancelled_timer_ignored() {
        let mut core = PollerCore::new();
        let old = core.start("1");
        let new = core.start("2");

        assert_eq!(core.observe(old, &PaymentStatus::Approved), PollEvent::Ignored);
        assert!(matches!(
            core.observe(new, &PaymentStatus::Approved),
            PollEvent::Confirmed { payment_id } if payment_id == "2"
        ));
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut core = PollerCore::new();
        let generation = core.start("1");
        core.reset();

        assert_eq!(core.state(), &PollState::Idle);
        assert_eq!(core.observe(generation, &PaymentStatus::Approved), PollEvent::Ignored);
    }
}
