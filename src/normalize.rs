// People Import - Value Normalization
// Forgiving coercions: bad input becomes None, never an error

use chrono::NaiveDate;

/// Decode a field as Latin-1. Every byte maps to the code point of the same
/// value, so this cannot fail.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Keep only ASCII digits (leading zeros included)
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Trimmed text, or None when nothing is left
pub fn text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Day/month/year date; ISO dates are accepted too
pub fn date_dmy(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .ok()
}

/// Decimal with either a comma or a dot as separator
pub fn decimal(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().replace(',', ".").parse().ok()?;
    // "NaN" and "inf" parse as f64
    value.is_finite().then_some(value)
}

/// Whole number; spreadsheet exports like "44.0" or "44,0" count too
pub fn integer(raw: &str) -> Option<i64> {
    if let Ok(value) = raw.trim().parse() {
        return Some(value);
    }
    let value = decimal(raw)?;
    let in_range = value >= i64::MIN as f64 && value < i64::MAX as f64;
    (value.fract() == 0.0 && in_range).then_some(value as i64)
}

/// Tri-state flag: Some(true), Some(false) or None for unrecognised tokens
pub fn flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "sim" | "s" | "true" | "1" => Some(true),
        "não" | "n" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// Phone candidate: digits only, at least `min_digits` long
pub fn phone_number(raw: &str, min_digits: usize) -> Option<String> {
    let digits = digits_only(raw);
    if digits.is_empty() || digits.len() < min_digits {
        None
    } else {
        Some(digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_latin1_maps_high_bytes() {
        // "João" in Latin-1
        let bytes = [0x4A, 0x6F, 0xE3, 0x6F];
        assert_eq!(decode_latin1(&bytes), "João");

        // Bytes that are invalid UTF-8 still decode
        assert_eq!(decode_latin1(&[0xFF, 0x80]).chars().count(), 2);
    }

    #[test]
    fn test_digits_only_keeps_leading_zeros() {
        assert_eq!(digits_only("012.345.678-90"), "01234567890");
        assert_eq!(digits_only("abc"), "");
    }

    #[test]
    fn test_date_invalid_calendar_day_is_absent() {
        assert_eq!(date_dmy("31/02/2000"), None);
        assert_eq!(
            date_dmy("29/02/2000"),
            NaiveDate::from_ymd_opt(2000, 2, 29)
        );
        assert_eq!(date_dmy(" 05/11/1980 "), NaiveDate::from_ymd_opt(1980, 11, 5));
        assert_eq!(date_dmy("1980-11-05"), NaiveDate::from_ymd_opt(1980, 11, 5));
        assert_eq!(date_dmy("ontem"), None);
    }

    #[test]
    fn test_decimal_comma() {
        assert_eq!(decimal("3500,75"), Some(3500.75));
        assert_eq!(decimal("1200.5"), Some(1200.5));
        assert_eq!(decimal("1.234,56"), None);
        assert_eq!(decimal("NaN"), None);
        assert_eq!(decimal(""), None);
    }

    #[test]
    fn test_integer() {
        assert_eq!(integer(" 42 "), Some(42));
        assert_eq!(integer("quarenta"), None);
    }

    #[test]
    fn test_integer_accepts_whole_decimals() {
        assert_eq!(integer("44.0"), Some(44));
        assert_eq!(integer(" 44,0"), Some(44));
        assert_eq!(integer("-3,00"), Some(-3));
        assert_eq!(integer("44.5"), None);
        assert_eq!(integer("1e30"), None);
        assert_eq!(integer("inf"), None);
    }

    #[test]
    fn test_flag_token_table() {
        for token in ["sim", "S", "1", "TRUE", " s "] {
            assert_eq!(flag(token), Some(true), "token {:?}", token);
        }
        for token in ["não", "NÃO", "N", "0", "false"] {
            assert_eq!(flag(token), Some(false), "token {:?}", token);
        }
        assert_eq!(flag("talvez"), None);
        assert_eq!(flag(""), None);
    }

    #[test]
    fn test_phone_number_min_length() {
        assert_eq!(phone_number("(11) 987", 8), None);
        assert_eq!(
            phone_number("11987654321", 8),
            Some("11987654321".to_string())
        );
        assert_eq!(phone_number("(11) 9876-5432", 8), Some("1198765432".to_string()));
        assert_eq!(phone_number("", 8), None);
    }
}
