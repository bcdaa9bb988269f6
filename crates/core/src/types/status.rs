//! Order lifecycle status and the inventory rule attached to each transition.
//!
//! ```text
//! DRAFT     -> PENDING, CANCELLED
//! PENDING   -> APPROVED, CANCELLED
//! APPROVED  -> SOLD, CANCELLED
//! SOLD      -> CANCELLED
//! CANCELLED    (terminal)
//! ```
//!
//! Stock is consumed exactly once, when an order enters `PENDING`. `SOLD`
//! never touches inventory. Cancelling an order that consumed stock restores
//! it from the order's own item snapshot.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Recorded from a verified proposal, stock not yet consumed.
    Draft,
    /// Committed; stock consumed.
    Pending,
    /// Accepted by the shop.
    Approved,
    /// Handed over and paid.
    Sold,
    /// Terminal.
    Cancelled,
}

/// What a transition does to inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryEffect {
    /// Stock is untouched.
    None,
    /// Item quantities are taken from stock.
    Consume,
    /// Item quantities are given back to stock.
    Restore,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Draft,
        Self::Pending,
        Self::Approved,
        Self::Sold,
        Self::Cancelled,
    ];

    /// Statuses reachable from `self` in one step.
    #[must_use]
    pub const fn next_statuses(self) -> &'static [Self] {
        match self {
            Self::Draft => &[Self::Pending, Self::Cancelled],
            Self::Pending => &[Self::Approved, Self::Cancelled],
            Self::Approved => &[Self::Sold, Self::Cancelled],
            Self::Sold => &[Self::Cancelled],
            Self::Cancelled => &[],
        }
    }

    /// Whether `self -> to` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        self.next_statuses().contains(&to)
    }

    /// Whether no transition leaves this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Inventory effect of the legal transition `self -> to`.
    ///
    /// `stock_consumed` is whether the order currently holds stock.
    #[must_use]
    pub const fn inventory_effect(self, to: Self, stock_consumed: bool) -> InventoryEffect {
        match (self, to) {
            (Self::Draft, Self::Pending) if !stock_consumed => InventoryEffect::Consume,
            (_, Self::Cancelled) if stock_consumed => InventoryEffect::Restore,
            _ => InventoryEffect::None,
        }
    }

    /// Wire name, e.g. `PENDING`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Sold => "SOLD",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}
