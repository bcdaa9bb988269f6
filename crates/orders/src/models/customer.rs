//! Customer record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chatshop_core::{CustomerId, Phone};

/// A stored customer. Read-only for this service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Internal row id, the only id accepted for candidate selection.
    pub id: CustomerId,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Canonical phone, unique.
    pub phone: Phone,
    /// Delivery address.
    pub address: String,
    /// Postal code.
    pub postal_code: String,
    /// Stable external identifier.
    pub customer_code: String,
    /// Shop notes.
    pub notes: Option<String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// Full name for display.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
