//! Destination phone normalization.
//!
//! The CRUD layer stores phones however the user typed them ("+55 (11)
//! 98888-7777", "11 98888 7777", ...). The provider wants digits only,
//! country-code first. Numbers that cannot plausibly be dialed come back
//! as `None` and the candidate is skipped, not failed.

/// Normalize to a digit-only, country-code-prefixed address.
///
/// Local numbers (10–11 digits: area code + 8/9 digit line) get the
/// configured country code prefixed; longer numbers are assumed to carry
/// their country code already.
pub fn normalize_phone(raw: &str, country_code: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        0..=9 => None,
        10 | 11 => Some(format!("{country_code}{digits}")),
        _ => Some(digits),
    }
}
