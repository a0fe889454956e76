use super::ParseError;
use crate::models::{Currency, HexId};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use std::collections::HashMap;

/// Seconds between the Unix epoch and 2000-01-01T00:00:00Z, the RAVEn epoch
pub const RAVEN_EPOCH_OFFSET: i64 = 946_684_800;

lazy_static! {
    // ISO 4217 numeric -> alphabetic, limited to the markets the gateway ships in
    static ref CURRENCY_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        map.insert(36, "AUD");
        map.insert(124, "CAD");
        map.insert(156, "CNY");
        map.insert(208, "DKK");
        map.insert(344, "HKD");
        map.insert(356, "INR");
        map.insert(392, "JPY");
        map.insert(484, "MXN");
        map.insert(554, "NZD");
        map.insert(578, "NOK");
        map.insert(702, "SGD");
        map.insert(710, "ZAR");
        map.insert(752, "SEK");
        map.insert(756, "CHF");
        map.insert(826, "GBP");
        map.insert(840, "USD");
        map.insert(978, "EUR");
        map.insert(986, "BRL");
        map
    };
}

fn invalid(field: &str, value: &str) -> ParseError {
    ParseError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

pub fn strip_hex_prefix(text: &str) -> &str {
    let text = text.trim();
    text.strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text)
}

pub fn parse_hex_u64(field: &str, text: &str) -> Result<u64, ParseError> {
    let digits = strip_hex_prefix(text);
    // from_str_radix also takes a leading sign
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid(field, text));
    }
    u64::from_str_radix(digits, 16).map_err(|_| invalid(field, text))
}

pub fn parse_decimal_u64(field: &str, text: &str) -> Result<u64, ParseError> {
    let digits = text.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(field, text));
    }
    digits.parse::<u64>().map_err(|_| invalid(field, text))
}

/// Decodes identifiers that may be wider than 64 bits (link keys are 128)
pub fn parse_hex_bytes(field: &str, text: &str) -> Result<HexId, ParseError> {
    let digits = strip_hex_prefix(text);
    if digits.is_empty() {
        return Err(invalid(field, text));
    }

    // the gateway drops leading zeros on some firmware versions
    let padded = if digits.len() % 2 == 1 {
        format!("0{}", digits)
    } else {
        digits.to_string()
    };

    hex::decode(padded)
        .map(HexId)
        .map_err(|_| invalid(field, text))
}

pub fn check_range(field: &str, value: u64, min: u64, max: u64) -> Result<u64, ParseError> {
    if value < min || value > max {
        return Err(ParseError::OutOfRange {
            field: field.to_string(),
            value,
        });
    }
    Ok(value)
}

pub fn parse_flag(field: &str, text: &str) -> Result<bool, ParseError> {
    match text.trim() {
        t if t.eq_ignore_ascii_case("Y") => Ok(true),
        t if t.eq_ignore_ascii_case("N") => Ok(false),
        _ => Err(invalid(field, text)),
    }
}

pub fn format_flag(value: bool) -> &'static str {
    if value { "Y" } else { "N" }
}

pub fn format_hex(value: u64) -> String {
    format!("{:#x}", value)
}

pub fn raven_time_to_utc(seconds: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(seconds).ok()?;
    DateTime::<Utc>::from_timestamp(seconds.checked_add(RAVEN_EPOCH_OFFSET)?, 0)
}

/// `None` for instants before the RAVEn epoch or past the 32 bit wire range
pub fn utc_to_raven_time(time: &DateTime<Utc>) -> Option<u64> {
    let seconds = time.timestamp() - RAVEN_EPOCH_OFFSET;
    if seconds < 0 || seconds > 0xffff_ffff {
        return None;
    }
    Some(seconds as u64)
}

pub fn lookup_currency(number: u16) -> Currency {
    Currency {
        number,
        code: CURRENCY_CODES.get(&number).copied(),
    }
}

pub fn currency_number(code: &str) -> Option<u16> {
    CURRENCY_CODES
        .iter()
        .find(|(_, c)| c.eq_ignore_ascii_case(code))
        .map(|(n, _)| *n)
}

/// Multiplier and divisor of zero mean "not used" and count as one
pub fn apply_ratio(raw: u64, multiplier: u64, divisor: u64) -> f64 {
    let multiplier = if multiplier == 0 { 1 } else { multiplier };
    let divisor = if divisor == 0 { 1 } else { divisor };
    raw as f64 * multiplier as f64 / divisor as f64
}

pub fn apply_trailing_digits(raw: u64, digits: u64) -> f64 {
    let digits = digits.min(i32::MAX as u64) as i32;
    raw as f64 / 10f64.powi(digits)
}
