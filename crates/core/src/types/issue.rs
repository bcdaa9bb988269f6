//! Structured descriptions of rejected input fields.
//!
//! These travel back to the conversational caller, which uses them to ask a
//! precise follow-up question. They never contain presentation text.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Why a supplied field value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueReason {
    /// Value is not one of the declared enum members.
    NotAllowed {
        /// The rejected value.
        value: String,
        /// The accepted values.
        allowed_values: Vec<String>,
    },
    /// Value does not parse as a number.
    NotANumber {
        /// The rejected value.
        value: String,
    },
    /// Number lies outside the declared bounds.
    OutOfRange {
        /// The rejected value.
        value: String,
        /// Inclusive lower bound, if any.
        min: Option<Decimal>,
        /// Inclusive upper bound, if any.
        max: Option<Decimal>,
    },
    /// Quantity below the minimum orderable amount.
    QuantityTooLow {
        /// The rejected quantity.
        value: i32,
        /// Minimum accepted quantity.
        min: i32,
    },
    /// Phone number did not parse.
    InvalidPhone {
        /// Parser message.
        message: String,
    },
    /// Postal code contains something other than digits and separators.
    InvalidPostalCode {
        /// The rejected value.
        value: String,
    },
}

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// Field or attribute key.
    pub field: String,
    /// What was wrong with it.
    #[serde(flatten)]
    pub reason: IssueReason,
}

impl FieldIssue {
    /// Create an issue for `field`.
    #[must_use]
    pub fn new(field: impl Into<String>, reason: IssueReason) -> Self {
        Self {
            field: field.into(),
            reason,
        }
    }
}
