//! Per-conversation order state.
//!
//! The caller owns the session and hands it back on every turn; the service
//! keeps no state of its own between calls.

use serde::{Deserialize, Serialize};

use chatshop_core::{CustomerId, OrderId};

use crate::services::proposal::SignedProposal;

/// What one conversation remembers between turns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSession {
    /// Customer resolved or attached most recently.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_customer_id: Option<CustomerId>,
    /// Proposal awaiting confirmation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<SignedProposal>,
    /// Order placed most recently.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_order_id: Option<OrderId>,
}

impl OrderSession {
    /// Whether a proposal is waiting for confirmation.
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop the pending proposal, e.g. when the customer changes their mind.
    pub fn discard_pending(&mut self) -> Option<SignedProposal> {
        self.pending.take()
    }
}
