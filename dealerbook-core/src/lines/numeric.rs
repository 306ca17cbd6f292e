use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Leniently parses a quantity or monetary value.
///
/// Thousands-separator commas and surrounding whitespace are ignored and the
/// longest leading decimal literal is used, so `"1,000"` is 1000 and
/// `"12 pcs"` is 12. Anything that does not start with a number is zero.
///
/// Numbers too large for a `Decimal` (magnitude above roughly 7.9e28, such
/// as a 30-digit integer) are treated as non-numeric and also read as zero.
/// This never fails.
///
/// # Example
///
/// ```rust
/// use dealerbook_core::lines::numeric::parse;
/// use rust_decimal::Decimal;
///
/// assert_eq!(parse("1,000"), Decimal::from(1000));
/// assert_eq!(parse("n/a"), Decimal::ZERO);
/// ```
pub fn parse(value: &str) -> Decimal {
    let cleaned: String = value.chars().filter(|c| *c != ',').collect();
    let literal = leading_literal(cleaned.trim());
    if literal.is_empty() {
        return Decimal::ZERO;
    }
    to_decimal(literal).unwrap_or(Decimal::ZERO)
}

/// Same as [`parse`] for a raw stored value.
///
/// Null is zero, numbers are taken as-is and strings go through [`parse`].
/// Booleans, arrays and objects are not numbers and read as zero.
pub fn coerce(value: &Value) -> Decimal {
    match value {
        Value::Number(n) => parse(&n.to_string()),
        Value::String(s) => parse(s),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => Decimal::ZERO,
    }
}

/// Returns the longest prefix of `s` that reads as a decimal literal:
/// optional sign, digits with an optional fraction, optional exponent.
fn leading_literal(s: &str) -> &str {
    let bytes = s.as_bytes();
    let len = bytes.len();
    let digits_from = |mut i: usize| {
        while i < len && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let int_end = digits_from(end);
    let mut mantissa_digits = int_end - end;
    end = int_end;

    if end < len && bytes[end] == b'.' {
        let frac_end = digits_from(end + 1);
        mantissa_digits += frac_end - (end + 1);
        if mantissa_digits > 0 {
            end = frac_end;
        }
    }
    if mantissa_digits == 0 {
        return "";
    }

    if end < len && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_start = end + 1;
        if exp_start < len && (bytes[exp_start] == b'+' || bytes[exp_start] == b'-') {
            exp_start += 1;
        }
        let exp_end = digits_from(exp_start);
        if exp_end > exp_start {
            end = exp_end;
        }
    }

    &s[..end]
}

fn to_decimal(literal: &str) -> Option<Decimal> {
    let (mantissa, exponent) = match literal.find(|c: char| c == 'e' || c == 'E') {
        Some(pos) => (&literal[..pos], Some(&literal[pos + 1..])),
        None => (literal, None),
    };

    let (negative, digits) = match mantissa.as_bytes().first() {
        Some(b'-') => (true, &mantissa[1..]),
        Some(b'+') => (false, &mantissa[1..]),
        _ => (false, mantissa),
    };
    let digits = digits.strip_suffix('.').unwrap_or(digits);
    let digits = if digits.starts_with('.') {
        format!("0{}", digits)
    } else {
        digits.to_string()
    };

    let mut value = Decimal::from_str(&digits).ok()?;
    if let Some(exponent) = exponent {
        let exponent: i64 = exponent.parse().ok()?;
        let scaled = format!("{}e{}", value, exponent);
        value = Decimal::from_scientific(&scaled).ok()?;
    }
    if negative {
        value.set_sign_negative(true);
    }
    Some(value)
}
