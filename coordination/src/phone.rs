//! Phone Normalization: North-American E.164 formatting
//!
//! Every number handed to the voice provider goes through [`normalize`].
//! The function is total: garbage in produces a (possibly degenerate) string
//! out, never a panic. Callers that need a number they can actually dial use
//! [`dialable`], which turns degenerate output into `None`.

/// Country prefix prepended to every normalized number.
pub const COUNTRY_PREFIX: &str = "+1";

/// Number of national digits in a dialable number.
pub const NATIONAL_DIGITS: usize = 10;

/// Normalize a raw phone string to `+1` followed by ten digits.
///
/// | digits after stripping            | result                 |
/// |-----------------------------------|------------------------|
/// | none                              | `""`                   |
/// | 10                                | `+1` + digits          |
/// | 11 starting with `1`              | `+` + digits           |
/// | 11 not starting with `1`          | `+1` + last 10         |
/// | more than 11                      | `+1` + last 10         |
/// | fewer than 10                     | `+1` + digits (invalid)|
pub fn normalize(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    match digits.len() {
        0 => String::new(),
        NATIONAL_DIGITS => format!("{COUNTRY_PREFIX}{digits}"),
        11 if digits.starts_with('1') => format!("+{digits}"),
        n if n >= 11 => format!("{COUNTRY_PREFIX}{}", &digits[n - NATIONAL_DIGITS..]),
        _ => format!("{COUNTRY_PREFIX}{digits}"),
    }
}

/// Whether `number` is exactly `+1` followed by ten digits.
pub fn is_dialable(number: &str) -> bool {
    number
        .strip_prefix(COUNTRY_PREFIX)
        .is_some_and(|rest| rest.len() == NATIONAL_DIGITS && rest.chars().all(|c| c.is_ascii_digit()))
}

/// Normalize and keep the result only if it can be dialed.
pub fn dialable(raw: &str) -> Option<String> {
    let number = normalize(raw);
    is_dialable(&number).then_some(number)
}
