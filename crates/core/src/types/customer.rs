//! Customer contact fields as supplied with an order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::issue::{FieldIssue, IssueReason};
use super::phone::Phone;
use super::text::normalize_digits;

/// Fields that must be present and non-empty before an order can be proposed.
pub const REQUIRED_CUSTOMER_FIELDS: [&str; 5] =
    ["first_name", "last_name", "phone", "address", "postal_code"];

/// Validated customer contact fields.
///
/// This is what a proposal signs and what an order snapshots at commit time.
/// Once written to an order it is never updated from the customer record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerFields {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Canonical phone number.
    pub phone: Phone,
    /// Delivery address.
    pub address: String,
    /// Postal code, ASCII digits and separators.
    pub postal_code: String,
    /// Free-form note from the customer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Problems found while reading customer fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerFieldIssues {
    /// Required fields that were absent or blank, in declaration order.
    pub missing: Vec<String>,
    /// Fields present but unusable.
    pub invalid: Vec<FieldIssue>,
}

impl CustomerFieldIssues {
    /// Whether nothing was wrong.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }
}

impl CustomerFields {
    /// Read customer fields from an untrusted key/value map.
    ///
    /// Values are trimmed; Persian and Arabic-Indic digits in the postal code
    /// are normalized. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns every missing required field and every invalid value at once
    /// so the caller can ask for all of them in one follow-up.
    pub fn from_map(fields: &BTreeMap<String, String>) -> Result<Self, CustomerFieldIssues> {
        let value = |key: &str| {
            fields
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let mut issues = CustomerFieldIssues::default();
        for key in REQUIRED_CUSTOMER_FIELDS {
            if value(key).is_none() {
                issues.missing.push(key.to_owned());
            }
        }

        let phone = value("phone").and_then(|raw| match Phone::parse(raw) {
            Ok(phone) => Some(phone),
            Err(e) => {
                issues.invalid.push(FieldIssue::new(
                    "phone",
                    IssueReason::InvalidPhone {
                        message: e.to_string(),
                    },
                ));
                None
            }
        });

        let postal_code = value("postal_code").and_then(|raw| {
            let normalized = normalize_digits(raw);
            if is_postal_code(&normalized) {
                Some(normalized)
            } else {
                issues.invalid.push(FieldIssue::new(
                    "postal_code",
                    IssueReason::InvalidPostalCode {
                        value: raw.to_owned(),
                    },
                ));
                None
            }
        });

        match (
            value("first_name"),
            value("last_name"),
            phone,
            value("address"),
            postal_code,
        ) {
            (Some(first_name), Some(last_name), Some(phone), Some(address), Some(postal_code))
                if issues.is_empty() =>
            {
                Ok(Self {
                    first_name: first_name.to_owned(),
                    last_name: last_name.to_owned(),
                    phone,
                    address: address.to_owned(),
                    postal_code,
                    notes: value("notes").map(str::to_owned),
                })
            }
            _ => Err(issues),
        }
    }

    /// Re-check fields that arrived already typed, e.g. in a signed proposal.
    ///
    /// The phone was validated when it was deserialized; this reports blank
    /// required text fields and a postal code that is not digits.
    #[must_use]
    pub fn issues(&self) -> CustomerFieldIssues {
        let mut issues = CustomerFieldIssues::default();
        let text = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("address", &self.address),
            ("postal_code", &self.postal_code),
        ];
        for (key, value) in text {
            if value.trim().is_empty() {
                issues.missing.push(key.to_owned());
            }
        }
        if !self.postal_code.trim().is_empty() && !is_postal_code(&self.postal_code) {
            issues.invalid.push(FieldIssue::new(
                "postal_code",
                IssueReason::InvalidPostalCode {
                    value: self.postal_code.clone(),
                },
            ));
        }
        issues
    }

    /// Full name for display.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

fn is_postal_code(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_digit() || c == '-' || c == ' ')
}
