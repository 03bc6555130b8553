//! Plain-text codecs
//!
//! One codec per target type, sharing the text/value conversion
//! functions below. Collection targets parse their text as JSON and
//! recurse through the JSON node conversions.

use crate::codecs::{geo, json, ConversionContext, ConvertingCodec, ExternalValue};
use crate::error::{Error, Result};
use crate::types::{CqlType, CqlValue};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

/// Build the text codec for a target type, if one exists
pub(crate) fn codec_for(
    ctx: Arc<ConversionContext>,
    target: &CqlType,
) -> Option<Arc<dyn ConvertingCodec>> {
    if matches!(target, CqlType::Udt(_)) {
        // UDT field types are not carried in CqlType; no codec.
        return None;
    }
    Some(Arc::new(StringCodec {
        ctx,
        target: target.clone(),
    }))
}

/// Codec converting between text fields and one CQL type
pub struct StringCodec {
    ctx: Arc<ConversionContext>,
    target: CqlType,
}

impl ConvertingCodec for StringCodec {
    fn target(&self) -> &CqlType {
        &self.target
    }

    fn external_to_internal(&self, external: &ExternalValue) -> Result<CqlValue> {
        match external {
            ExternalValue::Null => Ok(CqlValue::Null),
            ExternalValue::Text(text) => text_to_value(&self.ctx, text, &self.target),
            ExternalValue::Json(node) => json::node_to_value(&self.ctx, node, &self.target),
        }
    }

    fn internal_to_external(&self, internal: &CqlValue) -> Result<ExternalValue> {
        Ok(ExternalValue::Text(value_to_text(&self.ctx, internal)?))
    }
}

/// Convert a text field to a value of the target type
pub(crate) fn text_to_value(
    ctx: &ConversionContext,
    text: &str,
    target: &CqlType,
) -> Result<CqlValue> {
    if ctx.is_null_text(text) {
        return Ok(CqlValue::Null);
    }
    match target {
        CqlType::Text => Ok(CqlValue::Text(text.to_string())),
        CqlType::Ascii => {
            if !text.is_ascii() {
                return Err(Error::conversion(format!(
                    "Cannot convert '{}' to ascii: non-ASCII characters present",
                    text
                )));
            }
            Ok(CqlValue::Ascii(text.to_string()))
        }
        t if t.is_numeric() => ctx.number_to_value(ctx.parse_number(text)?, target),
        CqlType::Boolean => Ok(CqlValue::Boolean(ctx.parse_boolean(text)?)),
        CqlType::Timestamp => Ok(CqlValue::Timestamp(ctx.temporal.parse_timestamp(text)?)),
        CqlType::Date => Ok(CqlValue::Date(ctx.temporal.parse_date(text)?)),
        CqlType::Time => Ok(CqlValue::Time(ctx.temporal.parse_time(text)?)),
        CqlType::Uuid | CqlType::TimeUuid => {
            let uuid = Uuid::parse_str(text.trim())
                .map_err(|_| Error::conversion(format!("Cannot parse '{}' as a UUID", text)))?;
            if *target == CqlType::TimeUuid {
                if uuid.get_version_num() != 1 {
                    return Err(Error::conversion(format!(
                        "Cannot convert '{}' to timeuuid: not a version 1 UUID",
                        text
                    )));
                }
                Ok(CqlValue::TimeUuid(uuid))
            } else {
                Ok(CqlValue::Uuid(uuid))
            }
        }
        CqlType::Inet => text
            .trim()
            .parse()
            .map(CqlValue::Inet)
            .map_err(|_| Error::conversion(format!("Cannot parse '{}' as an inet", text))),
        CqlType::Blob => json::parse_blob(text),
        CqlType::Duration => parse_duration(text),
        t if t.is_geometry() => geo::parse_geometry(text, target),
        CqlType::List(_) | CqlType::Set(_) | CqlType::Map(_, _) | CqlType::Tuple(_) => {
            let node: JsonValue = serde_json::from_str(text).map_err(|e| {
                Error::conversion(format!("Cannot parse '{}' as JSON: {}", text, e))
            })?;
            json::node_to_value(ctx, &node, target)
        }
        other => Err(Error::conversion(format!(
            "Cannot convert '{}' to {}",
            text, other
        ))),
    }
}

/// Convert a value back to its text form
pub(crate) fn value_to_text(ctx: &ConversionContext, value: &CqlValue) -> Result<String> {
    match value {
        CqlValue::Null => Ok(ctx.null_text()),
        CqlValue::Text(s) | CqlValue::Ascii(s) => Ok(s.clone()),
        CqlValue::Boolean(b) => Ok(ctx.format_boolean(*b)),
        CqlValue::TinyInt(i) => Ok(i.to_string()),
        CqlValue::SmallInt(i) => Ok(i.to_string()),
        CqlValue::Int(i) => Ok(i.to_string()),
        CqlValue::Bigint(i) | CqlValue::Counter(i) => Ok(i.to_string()),
        CqlValue::Varint(i) => Ok(i.to_string()),
        CqlValue::Float(f) => Ok(f.to_string()),
        CqlValue::Double(d) => Ok(d.to_string()),
        CqlValue::Decimal { unscaled, scale } => {
            Ok(super::number::format_decimal(*unscaled, *scale))
        }
        CqlValue::Timestamp(ts) => Ok(ctx.temporal.format_timestamp(*ts)),
        CqlValue::Date(d) => Ok(ctx.temporal.format_date(*d)),
        CqlValue::Time(t) => Ok(ctx.temporal.format_time(*t)),
        CqlValue::Uuid(u) | CqlValue::TimeUuid(u) => Ok(u.to_string()),
        CqlValue::Inet(ip) => Ok(ip.to_string()),
        CqlValue::Blob(bytes) => Ok(BASE64.encode(bytes)),
        CqlValue::Duration { .. } => format_duration(value),
        CqlValue::Point { .. } | CqlValue::LineString(_) | CqlValue::Polygon(_) => {
            serde_json::to_string(&geo::to_geojson(value)?).map_err(Into::into)
        }
        CqlValue::List(_)
        | CqlValue::Set(_)
        | CqlValue::Map(_)
        | CqlValue::Tuple(_) => {
            serde_json::to_string(&json::value_to_node(ctx, value)?).map_err(Into::into)
        }
        CqlValue::Udt(name, _) => Err(Error::conversion(format!(
            "Cannot externalize UDT value of type {}",
            name
        ))),
    }
}

/// Parse a compact duration literal such as `1y2mo3d4h5m6s7ms8us9ns`
pub(crate) fn parse_duration(text: &str) -> Result<CqlValue> {
    let trimmed = text.trim();
    let (negative, mut rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    if rest.is_empty() {
        return Err(duration_error(text));
    }
    let mut months: i64 = 0;
    let mut days: i64 = 0;
    let mut nanos: i128 = 0;
    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| duration_error(text))?;
        if digits_end == 0 {
            return Err(duration_error(text));
        }
        let amount: i64 = rest[..digits_end]
            .parse()
            .map_err(|_| duration_error(text))?;
        rest = &rest[digits_end..];
        let unit_end = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        rest = &rest[unit_end..];
        match unit.to_lowercase().as_str() {
            "y" => months += amount * 12,
            "mo" => months += amount,
            "w" => days += amount * 7,
            "d" => days += amount,
            "h" => nanos += i128::from(amount) * 3_600_000_000_000,
            "m" => nanos += i128::from(amount) * 60_000_000_000,
            "s" => nanos += i128::from(amount) * 1_000_000_000,
            "ms" => nanos += i128::from(amount) * 1_000_000,
            "us" | "µs" => nanos += i128::from(amount) * 1_000,
            "ns" => nanos += i128::from(amount),
            _ => return Err(duration_error(text)),
        }
    }
    let sign = if negative { -1 } else { 1 };
    let months = i32::try_from(months * sign).map_err(|_| duration_error(text))?;
    let days = i32::try_from(days * sign).map_err(|_| duration_error(text))?;
    let nanos = i64::try_from(nanos * i128::from(sign)).map_err(|_| duration_error(text))?;
    Ok(CqlValue::Duration {
        months,
        days,
        nanos,
    })
}

/// Render a duration in the same compact literal form the parser accepts
pub(crate) fn format_duration(value: &CqlValue) -> Result<String> {
    let (months, days, nanos) = match value {
        CqlValue::Duration {
            months,
            days,
            nanos,
        } => (*months, *days, *nanos),
        other => {
            return Err(Error::conversion(format!(
                "Not a duration value: {}",
                other
            )))
        }
    };
    if months == 0 && days == 0 && nanos == 0 {
        return Ok("0s".to_string());
    }
    let negative = months < 0 || days < 0 || nanos < 0;
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    let months = i64::from(months).abs();
    let days = i64::from(days).abs();
    let mut nanos = i128::from(nanos).abs();
    let push = |amount: i128, unit: &str, out: &mut String| {
        if amount > 0 {
            out.push_str(&amount.to_string());
            out.push_str(unit);
        }
    };
    push(i128::from(months / 12), "y", &mut out);
    push(i128::from(months % 12), "mo", &mut out);
    push(i128::from(days), "d", &mut out);
    push(nanos / 3_600_000_000_000, "h", &mut out);
    nanos %= 3_600_000_000_000;
    push(nanos / 60_000_000_000, "m", &mut out);
    nanos %= 60_000_000_000;
    push(nanos / 1_000_000_000, "s", &mut out);
    nanos %= 1_000_000_000;
    push(nanos / 1_000_000, "ms", &mut out);
    nanos %= 1_000_000;
    push(nanos / 1_000, "us", &mut out);
    push(nanos % 1_000, "ns", &mut out);
    Ok(out)
}

fn duration_error(text: &str) -> Error {
    Error::conversion(format!("Cannot parse '{}' as a duration", text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodecConfig;
    use chrono::NaiveDate;

    fn ctx() -> ConversionContext {
        ConversionContext::new(&CodecConfig::default()).unwrap()
    }

    fn parse(text: &str, target: &CqlType) -> Result<CqlValue> {
        text_to_value(&ctx(), text, target)
    }

    #[test]
    fn test_bigint_from_valid_input() {
        assert_eq!(parse("0", &CqlType::Bigint).unwrap(), CqlValue::Bigint(0));
        assert_eq!(
            parse("9223372036854775807", &CqlType::Bigint).unwrap(),
            CqlValue::Bigint(i64::MAX)
        );
        assert_eq!(
            parse("-9,223,372,036,854,775,808", &CqlType::Bigint).unwrap(),
            CqlValue::Bigint(i64::MIN)
        );
        assert_eq!(
            parse("2000-01-01T00:00:00Z", &CqlType::Bigint).unwrap(),
            CqlValue::Bigint(946_684_800_000)
        );
        assert_eq!(
            parse("TRUE", &CqlType::Bigint).unwrap(),
            CqlValue::Bigint(1)
        );
        assert_eq!(parse("", &CqlType::Bigint).unwrap(), CqlValue::Null);
    }

    #[test]
    fn test_bigint_from_invalid_input() {
        assert!(parse("not a valid long", &CqlType::Bigint).is_err());
        assert!(parse("1.2", &CqlType::Bigint).is_err());
        assert!(parse("9223372036854775808", &CqlType::Bigint).is_err());
    }

    #[test]
    fn test_temporal_targets() {
        assert_eq!(
            parse("2024-02-29", &CqlType::Date).unwrap(),
            CqlValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert!(matches!(
            parse("2000-01-01T00:00:00Z", &CqlType::Timestamp).unwrap(),
            CqlValue::Timestamp(_)
        ));
    }

    #[test]
    fn test_uuid_and_timeuuid() {
        assert!(matches!(
            parse("6ba7b810-9dad-11d1-80b4-00c04fd430c8", &CqlType::Uuid).unwrap(),
            CqlValue::Uuid(_)
        ));
        // version 1
        assert!(matches!(
            parse("6ba7b810-9dad-11d1-80b4-00c04fd430c8", &CqlType::TimeUuid).unwrap(),
            CqlValue::TimeUuid(_)
        ));
        // version 4 is not a timeuuid
        assert!(parse("f47ac10b-58cc-4372-a567-0e02b2c3d479", &CqlType::TimeUuid).is_err());
    }

    #[test]
    fn test_collection_via_json() {
        assert_eq!(
            parse("[1, 2]", &CqlType::List(Box::new(CqlType::Int))).unwrap(),
            CqlValue::List(vec![CqlValue::Int(1), CqlValue::Int(2)])
        );
        assert!(parse("not json", &CqlType::List(Box::new(CqlType::Int))).is_err());
    }

    #[test]
    fn test_duration_round_trip() {
        let value = parse_duration("1y2mo3d4h5m6s").unwrap();
        assert_eq!(
            value,
            CqlValue::Duration {
                months: 14,
                days: 3,
                nanos: 4 * 3_600_000_000_000 + 5 * 60_000_000_000 + 6 * 1_000_000_000,
            }
        );
        let text = format_duration(&value).unwrap();
        assert_eq!(parse_duration(&text).unwrap(), value);
        assert_eq!(parse_duration("-2d").unwrap(), CqlValue::Duration {
            months: 0,
            days: -2,
            nanos: 0,
        });
        assert!(parse_duration("3parsecs").is_err());
    }

    #[test]
    fn test_null_renders_as_first_sentinel() {
        let context = ctx();
        assert_eq!(value_to_text(&context, &CqlValue::Null).unwrap(), "");
    }

    #[test]
    fn test_boolean_renders_with_first_pair() {
        let context = ctx();
        assert_eq!(
            value_to_text(&context, &CqlValue::Boolean(true)).unwrap(),
            "1"
        );
        assert_eq!(
            value_to_text(&context, &CqlValue::Boolean(false)).unwrap(),
            "0"
        );
    }

    #[test]
    fn test_geometry_renders_as_geojson() {
        let context = ctx();
        let text =
            value_to_text(&context, &CqlValue::Point { x: 1.0, y: 2.0 }).unwrap();
        assert!(text.contains("\"type\":\"Point\""));
    }
}
