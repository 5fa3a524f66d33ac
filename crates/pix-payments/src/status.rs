//! Payment Status Reconciliation
//!
//! A local, non-authoritative mirror of gateway payment status, and the
//! strategy that decides how the status endpoint answers.
//!
//! ```text
//!   create ──┐                      ┌── CacheBacked ──▶ cache.get(id)
//!            ▼                      │
//!      ┌───────────┐   resolve(id)  │
//!      │  Status   │◀───────────────┤
//!      │  Cache    │                │
//!      └───────────┘                └── DirectLookup ─▶ gateway.get_payment(id)
//!            ▲                                            └─▶ cache.set + dispatch
//!   webhook ─┘
//! ```

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use pix_core::PaymentStatus;

use crate::dispatcher::ConfirmationDispatcher;
use crate::error::{PaymentError, Result};
use crate::gateway::PaymentGateway;

/// What a `set` did to the stored status
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusTransition {
    /// Stored value before the call, if any
    pub previous: Option<PaymentStatus>,

    /// Stored value after the call
    pub current: PaymentStatus,

    /// False when the write was refused (approved is terminal)
    pub applied: bool,
}

impl StatusTransition {
    /// True only for the write that moved the payment into `approved`
    pub fn became_approved(&self) -> bool {
        self.applied
            && self.current.is_approved()
            && !self.previous.as_ref().is_some_and(PaymentStatus::is_approved)
    }
}

/// Status cache trait
pub trait StatusCache: Send + Sync {
    /// Record the latest status; an `approved` entry is never replaced
    fn set(&self, payment_id: &str, status: PaymentStatus) -> StatusTransition;

    /// Stored status, or `pending` for unknown payments
    fn get(&self, payment_id: &str) -> PaymentStatus;

    /// Number of tracked payments
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry
    fn clear(&self);
}

/// In-memory status cache; entries live for the life of the process
pub struct MemoryStatusCache {
    statuses: RwLock<HashMap<String, PaymentStatus>>,
}

impl Default for MemoryStatusCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStatusCache {
    pub fn new() -> Self {
        Self {
            statuses: RwLock::new(HashMap::new()),
        }
    }
}

impl StatusCache for MemoryStatusCache {
    fn set(&self, payment_id: &str, status: PaymentStatus) -> StatusTransition {
        let mut statuses = self.statuses.write().unwrap_or_else(PoisonError::into_inner);
        let previous = statuses.get(payment_id).cloned();

        if previous.as_ref().is_some_and(PaymentStatus::is_approved) && !status.is_approved() {
            tracing::warn!(
                payment_id = %payment_id,
                ignored = %status,
                "Ignoring status change after approval"
            );
            return StatusTransition {
                current: PaymentStatus::Approved,
                previous,
                applied: false,
            };
        }

        statuses.insert(payment_id.to_string(), status.clone());
        StatusTransition {
            previous,
            current: status,
            applied: true,
        }
    }

    fn get(&self, payment_id: &str) -> PaymentStatus {
        let statuses = self.statuses.read().unwrap_or_else(PoisonError::into_inner);
        statuses.get(payment_id).cloned().unwrap_or_default()
    }

    fn len(&self) -> usize {
        self.statuses.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn clear(&self) {
        self.statuses.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// How the status endpoint answers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusResolution {
    /// Answer from the cache; webhooks keep it current
    #[default]
    CacheBacked,

    /// Ask the gateway on every query and refresh the cache
    DirectLookup,
}

impl StatusResolution {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CacheBacked => "cache",
            Self::DirectLookup => "direct",
        }
    }
}

impl FromStr for StatusResolution {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cache" | "cache_backed" | "cache-backed" => Ok(Self::CacheBacked),
            "direct" | "direct_lookup" | "direct-lookup" => Ok(Self::DirectLookup),
            other => Err(PaymentError::Config(format!(
                "unknown status resolution: {other}"
            ))),
        }
    }
}

/// Answer for a status query
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedStatus {
    pub status: PaymentStatus,
    pub status_detail: Option<String>,
}

/// Status resolution pipeline
#[derive(Clone)]
pub struct StatusResolver {
    strategy: StatusResolution,
    cache: Arc<dyn StatusCache>,
    gateway: Arc<dyn PaymentGateway>,
    dispatcher: ConfirmationDispatcher,
}

impl StatusResolver {
    pub fn new(
        strategy: StatusResolution,
        cache: Arc<dyn StatusCache>,
        gateway: Arc<dyn PaymentGateway>,
        dispatcher: ConfirmationDispatcher,
    ) -> Self {
        Self {
            strategy,
            cache,
            gateway,
            dispatcher,
        }
    }

    pub const fn strategy(&self) -> StatusResolution {
        self.strategy
    }

    /// Current status of a payment according to the configured strategy
    pub async fn resolve(&self, payment_id: &str) -> Result<ResolvedStatus> {
        match self.strategy {
            StatusResolution::CacheBacked => Ok(ResolvedStatus {
                status: self.cache.get(payment_id),
                status_detail: None,
            }),
            StatusResolution::DirectLookup => self.lookup(payment_id).await,
        }
    }

    async fn lookup(&self, payment_id: &str) -> Result<ResolvedStatus> {
        let details = self.gateway.get_payment(payment_id).await?;
        let transition = self.cache.set(payment_id, details.status.clone());

        if transition.current.is_approved() {
            match details.payer_email.as_deref() {
                Some(email) => {
                    // The ledger turns repeated approvals into no-ops
                    self.dispatcher.confirm_payment(payment_id, email);
                }
                None => tracing::warn!(
                    payment_id = %payment_id,
                    "Approved payment has no payer email"
                ),
            }
        }

        Ok(ResolvedStatus {
            status: transition.current,
            status_detail: details.status_detail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{MockGateway, PixPaymentRequest};
    use crate::mailer::MemoryMailer;
    use pix_core::{EmailAddress, RetryPolicy};
    use rust_decimal_macros::dec;

    #[test]
    fn test_unknown_payment_is_pending() {
        let cache = MemoryStatusCache::new();
        assert_eq!(cache.get("missing"), PaymentStatus::Pending);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_set_overwrites() {
        let cache = MemoryStatusCache::new();
        cache.set("1", PaymentStatus::Pending);
        let t = cache.set("1", PaymentStatus::from("in_process"));

        assert!(t.applied);
        assert_eq!(t.previous, Some(PaymentStatus::Pending));
        assert_eq!(cache.get("1").as_str(), "in_process");
    }

    #[test]
    fn test_approved_never_reverts() {
        let cache = MemoryStatusCache::new();
        assert!(cache.set("1", PaymentStatus::Approved).became_approved());

        let t = cache.set("1", PaymentStatus::Pending);
        assert!(!t.applied);
        assert_eq!(cache.get("1"), PaymentStatus::Approved);
    }

    #[test]
    fn test_repeated_approval_is_not_a_transition() {
        let cache = MemoryStatusCache::new();
        cache.set("1", PaymentStatus::Pending);
        assert!(cache.set("1", PaymentStatus::Approved).became_approved());
        assert!(!cache.set("1", PaymentStatus::Approved).became_approved());
    }

    #[test]
    fn test_clear() {
        let cache = MemoryStatusCache::new();
        cache.set("1", PaymentStatus::Approved);
        cache.clear();
        assert_eq!(cache.get("1"), PaymentStatus::Pending);
    }

    #[test]
    fn test_parse_resolution() {
        assert_eq!("cache".parse::<StatusResolution>().unwrap(), StatusResolution::CacheBacked);
        assert_eq!("Direct".parse::<StatusResolution>().unwrap(), StatusResolution::DirectLookup);
        assert!("sometimes".parse::<StatusResolution>().is_err());
    }

    async fn fixture(
        strategy: StatusResolution,
    ) -> (StatusResolver, Arc<MockGateway>, Arc<MemoryMailer>, String) {
        let gateway = Arc::new(MockGateway::new());
        let mailer = Arc::new(MemoryMailer::new());
        let dispatcher = ConfirmationDispatcher::builder(mailer.clone())
            .policy(RetryPolicy::none())
            .build();
        let cache: Arc<dyn StatusCache> = Arc::new(MemoryStatusCache::new());

        let payment = gateway
            .create_payment(&PixPaymentRequest {
                email: EmailAddress::parse("a@b.com").unwrap(),
                amount: dec!(0.10),
                description: "test".into(),
            })
            .await
            .unwrap();
        cache.set(&payment.id, payment.status);

        let resolver = StatusResolver::new(strategy, cache, gateway.clone(), dispatcher);
        (resolver, gateway, mailer, payment.id)
    }

    #[tokio::test]
    async fn test_cache_backed_does_not_call_gateway() {
        let (resolver, gateway, _mailer, id) = fixture(StatusResolution::CacheBacked).await;
        gateway.set_status(&id, PaymentStatus::Approved);

        let resolved = resolver.resolve(&id).await.unwrap();
        assert_eq!(resolved.status, PaymentStatus::Pending);
        assert_eq!(gateway.lookup_calls(), 0);
    }

    #[tokio::test]
    async fn test_direct_lookup_dispatches_once() {
        let (resolver, gateway, mailer, id) = fixture(StatusResolution::DirectLookup).await;
        gateway.set_status(&id, PaymentStatus::Approved);

        let first = resolver.resolve(&id).await.unwrap();
        assert_eq!(first.status, PaymentStatus::Approved);
        resolver.resolve(&id).await.unwrap();

        tokio::task::yield_now().await;
        mailer.wait_for(1).await;
        assert_eq!(mailer.sent_to(), vec!["a@b.com".to_string()]);
        assert_eq!(gateway.lookup_calls(), 2);
    }

    #[tokio::test]
    async fn test_direct_lookup_propagates_gateway_error() {
        let (resolver, gateway, _mailer, id) = fixture(StatusResolution::DirectLookup).await;
        gateway.set_failing(true);
        assert!(resolver.resolve(&id).await.is_err());
    }
}
