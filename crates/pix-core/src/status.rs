//! Payment Status
//!
//! The gateway is the authority on settlement. We only give names to the two
//! states the checkout flow reacts to and keep every other value verbatim.

use serde::{Deserialize, Serialize};

/// Last-known status of a gateway payment
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentStatus {
    /// Awaiting settlement (also the answer for unknown payments)
    #[default]
    Pending,

    /// Settled; terminal for this flow
    Approved,

    /// Any other gateway-defined status (`rejected`, `in_process`, ...)
    Other(String),
}

impl PaymentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Other(s) => s,
        }
    }

    pub const fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

impl From<&str> for PaymentStatus {
    fn from(s: &str) -> Self {
        match s {
            "pending" => Self::Pending,
            "approved" => Self::Approved,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<PaymentStatus> for String {
    fn from(status: PaymentStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
