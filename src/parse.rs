use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use rust_decimal::Decimal;
use unicode_normalization::UnicodeNormalization;

use crate::error::{Result, TallyError};

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// NFKD-normalize and trim. Non-breaking spaces and other compatibility
/// characters found in bank exports become their plain equivalents.
pub fn normalize(raw: &str) -> String {
    raw.nfkd().collect::<String>().trim().to_string()
}

/// Optional fields pass through untouched when absent.
pub fn normalize_opt(raw: Option<&str>) -> Option<String> {
    raw.map(normalize)
}

/// Collapse every run of spaces into a single space.
pub fn collapse_spaces(raw: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("[ ]+").expect("invalid space regex"))
        .replace_all(raw, " ")
        .into_owned()
}

/// Collapse every run of tabs into a single tab.
pub fn collapse_tabs(raw: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("\t+").expect("invalid tab regex"))
        .replace_all(raw, "\t")
        .into_owned()
}

/// Decode ISO-8859-15 bytes. Identical to Latin-1 apart from eight code points.
pub fn decode_iso_8859_15(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0xA4 => '\u{20AC}',
            0xA6 => '\u{0160}',
            0xA8 => '\u{0161}',
            0xB4 => '\u{017D}',
            0xB8 => '\u{017E}',
            0xBC => '\u{0152}',
            0xBD => '\u{0153}',
            0xBE => '\u{0178}',
            other => other as char,
        })
        .collect()
}

/// Decode UTF-8 input, dropping a leading byte-order mark.
pub fn decode_utf8(bytes: &[u8]) -> Result<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8(bytes.to_vec())
        .map_err(|e| TallyError::StatementParse(format!("input is not valid UTF-8: {e}")))
}

// ---------------------------------------------------------------------------
// Numbers and dates
// ---------------------------------------------------------------------------

pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let cleaned = normalize(&raw.replace(',', ""));
    Decimal::from_str(&cleaned)
        .map_err(|_| TallyError::Parse(format!("'{raw}' is not a valid amount")))
}

/// Try each format in order and return the first successful parse. Formats
/// carrying a time component resolve to the date part.
pub fn parse_date(raw: &str, formats: &[&str]) -> Result<NaiveDate> {
    for fmt in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(dt.date());
        }
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Ok(d);
        }
    }
    Err(TallyError::Parse(format!(
        "date '{raw}' does not match any of the expected formats: {formats:?}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_normalize_trims_and_decomposes() {
        assert_eq!(normalize("  CARD PAYMENT \n"), "CARD PAYMENT");
        assert_eq!(normalize("\u{a0}01/02/2023"), "01/02/2023");
        assert_eq!(normalize("caf\u{e9}"), "cafe\u{301}");
    }

    #[test]
    fn test_normalize_opt_passes_none_through() {
        assert_eq!(normalize_opt(None), None);
        assert_eq!(normalize_opt(Some(" x ")), Some("x".to_string()));
    }

    #[test]
    fn test_collapse_spaces() {
        assert_eq!(collapse_spaces("TESCO   STORES    3"), "TESCO STORES 3");
        assert_eq!(collapse_spaces("a\t\tb"), "a\t\tb");
    }

    #[test]
    fn test_collapse_tabs() {
        assert_eq!(collapse_tabs("a\t\t\tb\tc"), "a\tb\tc");
        assert_eq!(collapse_tabs("a  b"), "a  b");
    }

    #[test]
    fn test_decode_iso_8859_15() {
        assert_eq!(decode_iso_8859_15(b"Amount: \xa4100"), "Amount: \u{20AC}100");
        assert_eq!(decode_iso_8859_15(b"caf\xe9"), "caf\u{e9}");
    }

    #[test]
    fn test_decode_utf8_strips_bom() {
        assert_eq!(decode_utf8(b"\xEF\xBB\xBFDate").unwrap(), "Date");
        assert!(decode_utf8(b"\xff\xfe").is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,234.56").unwrap(), dec("1234.56"));
        assert_eq!(parse_amount("  -42.50 ").unwrap(), dec("-42.5"));
        assert_eq!(parse_amount("\u{a0}7.00").unwrap(), dec("7"));
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        assert!(matches!(parse_amount("abc"), Err(TallyError::Parse(_))));
        assert!(matches!(parse_amount(""), Err(TallyError::Parse(_))));
    }

    #[test]
    fn test_parse_date_first_matching_format_wins() {
        let d = parse_date("24/11/2023", &["%d/%m/%Y"]).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2023, 11, 24).unwrap());
        let d = parse_date("2023-11-24 13:05:00", &["%d %b %Y", "%Y-%m-%d %H:%M:%S"]).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2023, 11, 24).unwrap());
        let d = parse_date("3 Feb 2024", &["%d %b %Y", "%Y-%m-%d %H:%M:%S"]).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 2, 3).unwrap());
    }

    #[test]
    fn test_parse_date_error_lists_formats() {
        let err = parse_date("yesterday", &["%d/%m/%Y", "%Y-%m-%d"]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("%d/%m/%Y"), "{msg}");
        assert!(msg.contains("%Y-%m-%d"), "{msg}");
    }
}
