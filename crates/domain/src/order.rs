//! Durable order record and its status state machine.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The lifecycle status of a purchase attempt.
///
/// Status transitions:
/// ```text
/// Pending ──┬──► Processing ──┬──► Completed
///           │                 │
///           └─────────────────┴──► Failed ──► Refunded
/// ```
///
/// A status never moves backwards: once `Completed`, `Failed`, or
/// `Refunded` is reached the order never returns to `Pending` or
/// `Processing`. `Failed → Refunded` is the one permitted move out of a
/// terminal status, recorded when the compensating refund succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Payment session confirmed, saga not yet dispatched.
    #[default]
    Pending,

    /// Automation dispatch is underway.
    Processing,

    /// The automated purchase succeeded (terminal).
    Completed,

    /// A saga step failed; compensation may still promote to Refunded.
    Failed,

    /// The payment hold was refunded after a failure (terminal).
    Refunded,
}

impl OrderStatus {
    /// Returns true if the state machine permits moving to `next`.
    ///
    /// Re-applying the current status is not a transition; stores treat it
    /// as an idempotent no-op instead.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Failed, Refunded)
        )
    }

    /// Returns true once the order has reached an end state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Failed | OrderStatus::Refunded
        )
    }

    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
            OrderStatus::Refunded => "refunded",
        }
    }

    /// Parses a stored status name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "processing" => Some(OrderStatus::Processing),
            "completed" => Some(OrderStatus::Completed),
            "failed" => Some(OrderStatus::Failed),
            "refunded" => Some(OrderStatus::Refunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The durable record of one purchase attempt.
///
/// Orders are never deleted; they are the audit trail of everything the
/// saga did on the user's behalf. `error_details` accumulates a narrative
/// of failures (original step error, then compensation results) and is
/// never rewritten, only appended to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub product_handle: String,
    pub product_name: String,
    /// Final charged price; persisted as a decimal string.
    pub price: Money,
    pub status: OrderStatus,
    /// Payment-gateway checkout session handle.
    pub session_id: String,
    /// Issuer cardholder id, set once provisioning succeeds. Never cleared.
    pub cardholder_id: Option<String>,
    /// Disposable card id, set once issuance succeeds. Never cleared.
    pub card_id: Option<String>,
    pub error_details: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new pending order for a confirmed payment session.
    pub fn new(
        user_id: UserId,
        product_handle: impl Into<String>,
        product_name: impl Into<String>,
        price: Money,
        session_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            user_id,
            product_handle: product_handle.into(),
            product_name: product_name.into(),
            price,
            status: OrderStatus::Pending,
            session_id: session_id.into(),
            cardholder_id: None,
            card_id: None,
            error_details: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a status update with optional failure details.
    ///
    /// Returns `Ok(true)` when the order changed, `Ok(false)` when the
    /// update was an exact repeat (same status, details already recorded) —
    /// the idempotent case. Invalid transitions are rejected.
    pub fn apply_status(
        &mut self,
        status: OrderStatus,
        details: Option<&str>,
    ) -> Result<bool, DomainError> {
        let same_status = self.status == status;
        let new_details = details.filter(|d| !self.has_error_segment(d));

        if same_status && new_details.is_none() {
            return Ok(false);
        }

        if !same_status && !self.status.can_transition_to(status) {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status,
                to: status,
            });
        }

        self.status = status;
        if let Some(d) = new_details {
            self.append_error(d);
        }
        self.updated_at = Utc::now();
        Ok(true)
    }

    /// Records the card identifiers once issuance has succeeded.
    ///
    /// Ids are required for compensation and are kept even when the saga
    /// later fails, so an already-set id is never overwritten with `None`.
    pub fn attach_card(&mut self, cardholder_id: &str, card_id: &str) {
        self.cardholder_id = Some(cardholder_id.to_string());
        self.card_id = Some(card_id.to_string());
        self.updated_at = Utc::now();
    }

    fn has_error_segment(&self, segment: &str) -> bool {
        self.error_details
            .as_deref()
            .is_some_and(|existing| existing.split("; ").any(|s| s == segment))
    }

    fn append_error(&mut self, segment: &str) {
        match &mut self.error_details {
            Some(existing) => {
                existing.push_str("; ");
                existing.push_str(segment);
            }
            None => self.error_details = Some(segment.to_string()),
        }
    }
}
