//! Phone number type.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::text::normalize_digits;

/// Errors that can occur when parsing a [`Phone`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input string is empty.
    #[error("phone cannot be empty")]
    Empty,
    /// The input contains something other than digits and separators.
    #[error("phone contains an invalid character: {0:?}")]
    InvalidCharacter(char),
    /// Too few or too many digits.
    #[error("phone must have between {min} and {max} digits")]
    BadLength {
        /// Minimum digit count.
        min: usize,
        /// Maximum digit count.
        max: usize,
    },
}

/// A phone number in canonical form.
///
/// Parsing accepts Persian and Arabic-Indic digits, spaces, dashes, dots,
/// parentheses and a single leading `+`. The canonical form keeps only the
/// digits (and the leading `+` when given), so two spellings of the same
/// number compare equal. Iranian numbers written with the `+98`, `0098` or
/// bare `98` country prefix are folded to the national `0…` form.
///
/// ## Constraints
///
/// - 7-15 digits (E.164 upper bound)
///
/// ## Examples
///
/// ```
/// use chatshop_core::Phone;
///
/// let phone = Phone::parse("۰۹۱۲ ۳۴۵ ۰۴۴۲").unwrap();
/// assert_eq!(phone.as_str(), "09123450442");
/// assert_eq!(phone.last_four(), "0442");
/// assert_eq!(Phone::parse("+98 912 345 0442").unwrap(), phone);
///
/// assert!(Phone::parse("").is_err());
/// assert!(Phone::parse("call me").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Phone(String);

impl Phone {
    /// Minimum number of digits.
    pub const MIN_DIGITS: usize = 7;
    /// Maximum number of digits (E.164).
    pub const MAX_DIGITS: usize = 15;

    /// Parse a `Phone` from user input.
    ///
    /// # Errors
    ///
    /// Returns an error if the input:
    /// - Is empty
    /// - Contains letters or other symbols
    /// - Has fewer than 7 or more than 15 digits
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PhoneError::Empty);
        }

        let normalized = normalize_digits(trimmed);
        let mut canonical = String::with_capacity(normalized.len());
        for (i, c) in normalized.chars().enumerate() {
            match c {
                '0'..='9' => canonical.push(c),
                '+' if i == 0 => canonical.push(c),
                ' ' | '-' | '.' | '(' | ')' => {}
                other => return Err(PhoneError::InvalidCharacter(other)),
            }
        }

        let digit_count = canonical.chars().filter(char::is_ascii_digit).count();
        if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digit_count) {
            return Err(PhoneError::BadLength {
                min: Self::MIN_DIGITS,
                max: Self::MAX_DIGITS,
            });
        }

        Ok(Self(national_form(canonical)))
    }

    /// Returns the canonical phone as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Phone` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// The last four digits.
    #[must_use]
    pub fn last_four(&self) -> String {
        let digits: Vec<char> = self.0.chars().filter(char::is_ascii_digit).collect();
        let start = digits.len().saturating_sub(4);
        digits.iter().skip(start).collect()
    }

    /// A display form that reveals only the last four digits, e.g. `***0442`.
    #[must_use]
    pub fn masked(&self) -> String {
        format!("***{}", self.last_four())
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Phone {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Phone {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Phone> for String {
    fn from(phone: Phone) -> Self {
        phone.0
    }
}

impl AsRef<str> for Phone {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Phone {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Phone {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Database values are written in canonical form
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Phone {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

/// Iranian country code.
const IRAN_PREFIX: &str = "98";

/// Length of a national Iranian number without its leading `0`.
const IRAN_NATIONAL_DIGITS: usize = 10;

/// Rewrite `+98…`, `0098…` and `98…` to `0…` when ten national digits follow.
fn national_form(canonical: String) -> String {
    let rest = canonical
        .strip_prefix('+')
        .or_else(|| canonical.strip_prefix("00"))
        .unwrap_or(&canonical);
    match rest.strip_prefix(IRAN_PREFIX) {
        Some(national)
            if national.len() == IRAN_NATIONAL_DIGITS && !national.starts_with('0') =>
        {
            format!("0{national}")
        }
        _ => canonical,
    }
}
