//! Locale-aware number parsing and narrowing
//!
//! Input accepts an optional grouping separator and a configurable
//! decimal separator. Output always renders the canonical unlocalized
//! form so that canonical inputs round-trip unchanged.

use crate::config::{NumberLocale, OverflowStrategy, RoundingMode};
use crate::error::{Error, Result};

/// A number parsed from text, before narrowing to the target CQL type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedNumber {
    /// An integral value with no fractional part
    Integer(i128),
    /// A fixed-point value as unscaled digits and scale
    Decimal { unscaled: i128, scale: u32 },
    /// A value only representable as floating point (exponents, infinities)
    Float(f64),
}

/// Locale-aware decimal parser
#[derive(Debug, Clone)]
pub struct NumberFormat {
    locale: NumberLocale,
}

impl NumberFormat {
    pub fn new(locale: NumberLocale) -> Self {
        Self { locale }
    }

    /// Parse a localized numeric string.
    ///
    /// Grouping separators are accepted anywhere between digits; the
    /// locale's decimal separator marks the fraction.
    pub fn parse(&self, text: &str) -> Result<ParsedNumber> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(Error::conversion("Cannot parse empty string as a number"));
        }

        let mut normalized = String::with_capacity(trimmed.len());
        let mut prev_digit = false;
        let chars: Vec<char> = trimmed.chars().collect();
        for (i, &c) in chars.iter().enumerate() {
            if c == self.locale.grouping_separator
                && prev_digit
                && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())
            {
                continue;
            }
            if c == self.locale.decimal_separator {
                normalized.push('.');
                prev_digit = false;
                continue;
            }
            prev_digit = c.is_ascii_digit();
            normalized.push(c);
        }

        if let Ok(i) = normalized.parse::<i128>() {
            return Ok(ParsedNumber::Integer(i));
        }
        if let Some(decimal) = parse_fixed_point(&normalized) {
            return Ok(decimal);
        }
        match normalized.parse::<f64>() {
            Ok(f) => Ok(ParsedNumber::Float(f)),
            Err(_) => Err(Error::conversion(format!(
                "Cannot parse '{}' as a number",
                text
            ))),
        }
    }
}

/// Parse `digits.digits` into an unscaled value and scale
fn parse_fixed_point(text: &str) -> Option<ParsedNumber> {
    let (int_part, frac_part) = text.split_once('.')?;
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.chars().any(|c| !c.is_ascii_digit()) {
        return None;
    }
    let mut digits = String::with_capacity(int_part.len() + frac_part.len());
    digits.push_str(int_part);
    digits.push_str(frac_part);
    let unscaled: i128 = digits.parse().ok()?;
    Some(if frac_part.is_empty() {
        ParsedNumber::Integer(unscaled)
    } else {
        ParsedNumber::Decimal {
            unscaled,
            scale: frac_part.len() as u32,
        }
    })
}

/// Round `unscaled / 10^scale` to an integer per the rounding mode
fn round_decimal(unscaled: i128, scale: u32, mode: RoundingMode) -> i128 {
    let divisor = 10i128.pow(scale);
    let quotient = unscaled / divisor;
    let remainder = unscaled % divisor;
    if remainder == 0 {
        return quotient;
    }
    let positive = unscaled >= 0;
    let bump: i128 = if positive { 1 } else { -1 };
    let twice_remainder = remainder.abs() * 2;
    match mode {
        RoundingMode::Down => quotient,
        RoundingMode::Up => quotient + bump,
        RoundingMode::Floor => {
            if positive {
                quotient
            } else {
                quotient - 1
            }
        }
        RoundingMode::Ceiling => {
            if positive {
                quotient + 1
            } else {
                quotient
            }
        }
        RoundingMode::HalfUp => {
            if twice_remainder >= divisor {
                quotient + bump
            } else {
                quotient
            }
        }
        RoundingMode::HalfEven => {
            if twice_remainder > divisor || (twice_remainder == divisor && quotient % 2 != 0) {
                quotient + bump
            } else {
                quotient
            }
        }
    }
}

/// Narrow a parsed number to an i128 integer per the overflow strategy
pub fn narrow_to_integer(
    number: ParsedNumber,
    overflow: OverflowStrategy,
    rounding: RoundingMode,
) -> Result<i128> {
    match number {
        ParsedNumber::Integer(i) => Ok(i),
        ParsedNumber::Decimal { unscaled, scale } => match overflow {
            OverflowStrategy::Reject => Err(Error::conversion(format!(
                "Cannot convert {}e-{} to an integer: value has a fractional part",
                unscaled, scale
            ))),
            OverflowStrategy::Truncate => Ok(round_decimal(unscaled, scale, rounding)),
        },
        ParsedNumber::Float(f) => {
            if f.fract() == 0.0 && f.is_finite() {
                Ok(f as i128)
            } else {
                match overflow {
                    OverflowStrategy::Reject => Err(Error::conversion(format!(
                        "Cannot convert {} to an integer: value has a fractional part",
                        f
                    ))),
                    OverflowStrategy::Truncate => {
                        if !f.is_finite() {
                            return Err(Error::conversion(format!(
                                "Cannot convert {} to an integer",
                                f
                            )));
                        }
                        // Fixed-point rounding via one decimal digit of fraction.
                        let scaled = (f * 10.0).round() as i128;
                        Ok(round_decimal(scaled, 1, rounding))
                    }
                }
            }
        }
    }
}

/// Narrow a parsed number to a bounded integer type
pub fn narrow_to_bounded(
    number: ParsedNumber,
    min: i128,
    max: i128,
    type_name: &str,
    overflow: OverflowStrategy,
    rounding: RoundingMode,
) -> Result<i128> {
    let value = narrow_to_integer(number, overflow, rounding)?;
    if value < min || value > max {
        match overflow {
            OverflowStrategy::Reject => Err(Error::conversion(format!(
                "Cannot convert {} to {}: value out of range",
                value, type_name
            ))),
            OverflowStrategy::Truncate => Ok(value.clamp(min, max)),
        }
    } else {
        Ok(value)
    }
}

/// Widen a parsed number to f64
pub fn widen_to_f64(number: ParsedNumber) -> f64 {
    match number {
        ParsedNumber::Integer(i) => i as f64,
        ParsedNumber::Decimal { unscaled, scale } => {
            unscaled as f64 / 10f64.powi(scale as i32)
        }
        ParsedNumber::Float(f) => f,
    }
}

/// Convert a parsed number to decimal unscaled/scale form
pub fn to_decimal(number: ParsedNumber) -> Result<(i128, u32)> {
    match number {
        ParsedNumber::Integer(i) => Ok((i, 0)),
        ParsedNumber::Decimal { unscaled, scale } => Ok((unscaled, scale)),
        ParsedNumber::Float(f) => {
            if !f.is_finite() {
                return Err(Error::conversion(format!(
                    "Cannot convert {} to a decimal",
                    f
                )));
            }
            let text = format!("{}", f);
            match parse_fixed_point(&text) {
                Some(ParsedNumber::Decimal { unscaled, scale }) => Ok((unscaled, scale)),
                Some(ParsedNumber::Integer(i)) => Ok((i, 0)),
                _ => match text.parse::<i128>() {
                    Ok(i) => Ok((i, 0)),
                    Err(_) => Err(Error::conversion(format!(
                        "Cannot convert {} to a decimal",
                        f
                    ))),
                },
            }
        }
    }
}

/// Render a decimal value in canonical form
pub fn format_decimal(unscaled: i128, scale: u32) -> String {
    if scale == 0 {
        return unscaled.to_string();
    }
    let negative = unscaled < 0;
    let digits = unscaled.unsigned_abs().to_string();
    let scale = scale as usize;
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if digits.len() > scale {
        let split = digits.len() - scale;
        out.push_str(&digits[..split]);
        out.push('.');
        out.push_str(&digits[split..]);
    } else {
        out.push_str("0.");
        for _ in 0..(scale - digits.len()) {
            out.push('0');
        }
        out.push_str(&digits);
    }
    out
}
