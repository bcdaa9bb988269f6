//! Text normalization for conversational input.
//!
//! Chat input mixes Persian, Arabic-Indic and ASCII digits, and Arabic and
//! Persian letter forms of the same name. Everything that is compared or
//! parsed goes through these functions first.

/// Map Persian (`۰`-`۹`) and Arabic-Indic (`٠`-`٩`) digits to ASCII.
///
/// ```
/// use chatshop_core::text::normalize_digits;
///
/// assert_eq!(normalize_digits("۰۹۱۲"), "0912");
/// assert_eq!(normalize_digits("٠٤٤٢"), "0442");
/// assert_eq!(normalize_digits("size 42"), "size 42");
/// ```
#[must_use]
pub fn normalize_digits(input: &str) -> String {
    input.chars().map(ascii_digit).collect()
}

/// Keep only the ASCII digits of `input`, after digit normalization.
#[must_use]
pub fn digits_only(input: &str) -> String {
    input
        .chars()
        .map(ascii_digit)
        .filter(char::is_ascii_digit)
        .collect()
}

/// Fold a name for matching.
///
/// Arabic `ي`/`ى` and `ك` become Persian `ی` and `ک`, ZWNJ becomes a space,
/// tatweel is dropped, and the result is lower-cased with collapsed
/// whitespace.
#[must_use]
pub fn fold_name(input: &str) -> String {
    let folded: String = input
        .chars()
        .filter(|c| *c != '\u{0640}')
        .map(|c| match c {
            '\u{064A}' | '\u{0649}' => '\u{06CC}',
            '\u{0643}' => '\u{06A9}',
            '\u{200C}' => ' ',
            other => ascii_digit(other),
        })
        .flat_map(char::to_lowercase)
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a folded name into tokens.
#[must_use]
pub fn name_tokens(input: &str) -> Vec<String> {
    fold_name(input)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

const fn ascii_digit(c: char) -> char {
    match c {
        '\u{06F0}'..='\u{06F9}' => offset_digit(c, '\u{06F0}'),
        '\u{0660}'..='\u{0669}' => offset_digit(c, '\u{0660}'),
        other => other,
    }
}

const fn offset_digit(c: char, zero: char) -> char {
    let value = c as u32 - zero as u32;
    match char::from_digit(value, 10) {
        Some(d) => d,
        None => c,
    }
}
