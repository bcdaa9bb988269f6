//! Attribute schema validation.
//!
//! A pure check of an attribute map against a product's declared schema.
//! `string`, `boolean` and `measure` entries are presence-checked only.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;

use chatshop_core::{
    AttributeKind, AttributeMap, AttributeSchema, FieldIssue, IssueReason,
    text::normalize_digits,
};

/// Outcome of [`validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttributeCheck {
    /// Required keys absent from the map, in schema order.
    pub missing: Vec<String>,
    /// Present values that fail their declared type.
    pub invalid: Vec<FieldIssue>,
}

impl AttributeCheck {
    /// Whether the attributes were accepted.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }
}

/// Validate `attributes` against `schema`.
///
/// Keys not declared by the schema are left alone.
#[must_use]
pub fn validate(schema: &AttributeSchema, attributes: &AttributeMap) -> AttributeCheck {
    let mut check = AttributeCheck::default();

    for spec in schema.iter() {
        let Some(value) = attributes.get(&spec.key) else {
            if spec.required {
                check.missing.push(spec.key.clone());
            }
            continue;
        };

        if let Some(reason) = check_value(&spec.kind, value) {
            check.invalid.push(FieldIssue::new(spec.key.clone(), reason));
        }
    }

    check
}

fn check_value(kind: &AttributeKind, value: &str) -> Option<IssueReason> {
    match kind {
        AttributeKind::Enum { allowed_values } => {
            if allowed_values.iter().any(|allowed| allowed.trim() == value) {
                None
            } else {
                Some(IssueReason::NotAllowed {
                    value: value.to_owned(),
                    allowed_values: allowed_values.clone(),
                })
            }
        }
        AttributeKind::Number { min, max, .. } => {
            let Some(number) = parse_number(value) else {
                return Some(IssueReason::NotANumber {
                    value: value.to_owned(),
                });
            };
            let below = min.is_some_and(|min| number < min);
            let above = max.is_some_and(|max| number > max);
            (below || above).then(|| IssueReason::OutOfRange {
                value: value.to_owned(),
                min: *min,
                max: *max,
            })
        }
        AttributeKind::String | AttributeKind::Boolean | AttributeKind::Measure { .. } => None,
    }
}

/// Parse a decimal written with ASCII, Persian or Arabic-Indic digits.
///
/// The Arabic decimal separator `٫` is accepted in place of `.`.
fn parse_number(value: &str) -> Option<Decimal> {
    let normalized = normalize_digits(value).replace('\u{066B}', ".");
    Decimal::from_str(normalized.trim()).ok()
}
