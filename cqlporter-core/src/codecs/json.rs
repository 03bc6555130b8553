//! JSON node codecs
//!
//! One codec per target type, all sharing the recursive node/value
//! conversion functions below. Collections, tuples and geometry recurse
//! through the same entry points.

use crate::codecs::number::ParsedNumber;
use crate::codecs::{geo, string, ConversionContext, ConvertingCodec, ExternalValue};
use crate::error::{Error, Result};
use crate::types::{CqlType, CqlValue};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::sync::Arc;
use uuid::Uuid;

/// Build the JSON codec for a target type, if one exists
pub(crate) fn codec_for(
    ctx: Arc<ConversionContext>,
    target: &CqlType,
) -> Option<Arc<dyn ConvertingCodec>> {
    if matches!(target, CqlType::Udt(_)) {
        // UDT field types are not carried in CqlType; no codec.
        return None;
    }
    Some(Arc::new(JsonNodeCodec {
        ctx,
        target: target.clone(),
    }))
}

/// Codec converting between JSON nodes and one CQL type
pub struct JsonNodeCodec {
    ctx: Arc<ConversionContext>,
    target: CqlType,
}

impl ConvertingCodec for JsonNodeCodec {
    fn target(&self) -> &CqlType {
        &self.target
    }

    fn external_to_internal(&self, external: &ExternalValue) -> Result<CqlValue> {
        match external {
            ExternalValue::Null => Ok(CqlValue::Null),
            ExternalValue::Json(node) => node_to_value(&self.ctx, node, &self.target),
            ExternalValue::Text(text) => {
                node_to_value(&self.ctx, &JsonValue::String(text.clone()), &self.target)
            }
        }
    }

    fn internal_to_external(&self, internal: &CqlValue) -> Result<ExternalValue> {
        Ok(ExternalValue::Json(value_to_node(&self.ctx, internal)?))
    }
}

/// Convert a JSON node to a value of the target type
pub(crate) fn node_to_value(
    ctx: &ConversionContext,
    node: &JsonValue,
    target: &CqlType,
) -> Result<CqlValue> {
    if node.is_null() {
        return Ok(CqlValue::Null);
    }
    if let JsonValue::String(text) = node {
        if ctx.is_null_text(text) {
            return Ok(CqlValue::Null);
        }
    }
    match target {
        CqlType::Text => Ok(CqlValue::Text(node_to_text(node)?)),
        CqlType::Ascii => {
            let text = node_to_text(node)?;
            if !text.is_ascii() {
                return Err(Error::conversion(format!(
                    "Cannot convert '{}' to ascii: non-ASCII characters present",
                    text
                )));
            }
            Ok(CqlValue::Ascii(text))
        }
        t if t.is_numeric() => match node {
            JsonValue::Number(_) => ctx.number_to_value(node_to_number(node)?, target),
            JsonValue::String(text) => ctx.number_to_value(ctx.parse_number(text)?, target),
            JsonValue::Bool(b) => {
                let (t_num, f_num) = ctx.boolean_numbers;
                ctx.number_to_value(
                    ParsedNumber::Integer(i128::from(if *b { t_num } else { f_num })),
                    target,
                )
            }
            other => Err(mismatch(other, target)),
        },
        CqlType::Boolean => match node {
            JsonValue::Bool(b) => Ok(CqlValue::Boolean(*b)),
            JsonValue::String(text) => Ok(CqlValue::Boolean(ctx.parse_boolean(text)?)),
            JsonValue::Number(_) => ctx.number_to_value(node_to_number(node)?, target),
            other => Err(mismatch(other, target)),
        },
        CqlType::Timestamp => match node {
            JsonValue::String(text) => Ok(CqlValue::Timestamp(ctx.temporal.parse_timestamp(text)?)),
            JsonValue::Number(_) => ctx.number_to_value(node_to_number(node)?, target),
            other => Err(mismatch(other, target)),
        },
        CqlType::Date => match node {
            JsonValue::String(text) => Ok(CqlValue::Date(ctx.temporal.parse_date(text)?)),
            JsonValue::Number(n) => {
                let days = n
                    .as_i64()
                    .ok_or_else(|| mismatch(node, target))?
                    .to_string();
                Ok(CqlValue::Date(ctx.temporal.parse_date(&days)?))
            }
            other => Err(mismatch(other, target)),
        },
        CqlType::Time => match node {
            JsonValue::String(text) => Ok(CqlValue::Time(ctx.temporal.parse_time(text)?)),
            JsonValue::Number(n) => {
                let units = n
                    .as_i64()
                    .ok_or_else(|| mismatch(node, target))?
                    .to_string();
                Ok(CqlValue::Time(ctx.temporal.parse_time(&units)?))
            }
            other => Err(mismatch(other, target)),
        },
        CqlType::Uuid | CqlType::TimeUuid => {
            let text = node
                .as_str()
                .ok_or_else(|| mismatch(node, target))?;
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
        CqlType::Inet => {
            let text = node
                .as_str()
                .ok_or_else(|| mismatch(node, target))?;
            text.trim()
                .parse()
                .map(CqlValue::Inet)
                .map_err(|_| Error::conversion(format!("Cannot parse '{}' as an inet", text)))
        }
        CqlType::Blob => {
            let text = node
                .as_str()
                .ok_or_else(|| mismatch(node, target))?;
            parse_blob(text)
        }
        CqlType::Duration => {
            let text = node
                .as_str()
                .ok_or_else(|| mismatch(node, target))?;
            string::parse_duration(text)
        }
        t if t.is_geometry() => match node {
            JsonValue::String(text) => geo::parse_geometry(text, target),
            JsonValue::Object(_) => geo::from_geojson(node, target),
            other => Err(mismatch(other, target)),
        },
        CqlType::List(inner) | CqlType::Set(inner) => {
            let items = node
                .as_array()
                .ok_or_else(|| mismatch(node, target))?
                .iter()
                .map(|item| node_to_value(ctx, item, inner))
                .collect::<Result<Vec<_>>>()?;
            Ok(match target {
                CqlType::List(_) => CqlValue::List(items),
                _ => CqlValue::Set(items),
            })
        }
        CqlType::Map(key_type, value_type) => {
            let object = node
                .as_object()
                .ok_or_else(|| mismatch(node, target))?;
            let mut entries = Vec::with_capacity(object.len());
            for (key, value) in object {
                let key_value = string::text_to_value(ctx, key, key_type)?;
                let value_value = node_to_value(ctx, value, value_type)?;
                entries.push((key_value, value_value));
            }
            Ok(CqlValue::Map(entries))
        }
        CqlType::Tuple(item_types) => {
            let items = node
                .as_array()
                .ok_or_else(|| mismatch(node, target))?;
            if items.len() != item_types.len() {
                return Err(Error::conversion(format!(
                    "Cannot convert {} to {}: expecting {} fields, got {}",
                    node,
                    target,
                    item_types.len(),
                    items.len()
                )));
            }
            items
                .iter()
                .zip(item_types)
                .map(|(item, item_type)| node_to_value(ctx, item, item_type))
                .collect::<Result<Vec<_>>>()
                .map(CqlValue::Tuple)
        }
        other => Err(mismatch(node, other)),
    }
}

/// Convert a value back to its JSON node form
pub(crate) fn value_to_node(ctx: &ConversionContext, value: &CqlValue) -> Result<JsonValue> {
    match value {
        CqlValue::Null => Ok(JsonValue::Null),
        CqlValue::Text(s) | CqlValue::Ascii(s) => Ok(JsonValue::String(s.clone())),
        CqlValue::Boolean(b) => Ok(JsonValue::Bool(*b)),
        CqlValue::TinyInt(i) => Ok(JsonValue::from(*i)),
        CqlValue::SmallInt(i) => Ok(JsonValue::from(*i)),
        CqlValue::Int(i) => Ok(JsonValue::from(*i)),
        CqlValue::Bigint(i) | CqlValue::Counter(i) => Ok(JsonValue::from(*i)),
        CqlValue::Float(f) => Ok(float_node(f64::from(*f))),
        CqlValue::Double(d) => Ok(float_node(*d)),
        CqlValue::Varint(i) => {
            if let Ok(small) = i64::try_from(*i) {
                Ok(JsonValue::from(small))
            } else {
                Ok(JsonValue::String(i.to_string()))
            }
        }
        CqlValue::Decimal { unscaled, scale } => {
            let text = super::number::format_decimal(*unscaled, *scale);
            match text.parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(float_node(f)),
                _ => Ok(JsonValue::String(text)),
            }
        }
        CqlValue::Timestamp(ts) => Ok(JsonValue::String(ctx.temporal.format_timestamp(*ts))),
        CqlValue::Date(d) => Ok(JsonValue::String(ctx.temporal.format_date(*d))),
        CqlValue::Time(t) => Ok(JsonValue::String(ctx.temporal.format_time(*t))),
        CqlValue::Uuid(u) | CqlValue::TimeUuid(u) => Ok(JsonValue::String(u.to_string())),
        CqlValue::Inet(ip) => Ok(JsonValue::String(ip.to_string())),
        CqlValue::Blob(bytes) => Ok(JsonValue::String(BASE64.encode(bytes))),
        CqlValue::Duration { .. } => Ok(JsonValue::String(string::format_duration(value)?)),
        CqlValue::Point { .. } | CqlValue::LineString(_) | CqlValue::Polygon(_) => {
            geo::to_geojson(value)
        }
        CqlValue::List(items) | CqlValue::Set(items) | CqlValue::Tuple(items) => items
            .iter()
            .map(|item| value_to_node(ctx, item))
            .collect::<Result<Vec<_>>>()
            .map(JsonValue::Array),
        CqlValue::Map(entries) => {
            let mut object = JsonMap::with_capacity(entries.len());
            for (key, value) in entries {
                object.insert(string::value_to_text(ctx, key)?, value_to_node(ctx, value)?);
            }
            Ok(JsonValue::Object(object))
        }
        CqlValue::Udt(name, _) => Err(Error::conversion(format!(
            "Cannot externalize UDT value of type {}",
            name
        ))),
    }
}

fn node_to_text(node: &JsonValue) -> Result<String> {
    match node {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::Bool(b) => Ok(b.to_string()),
        other => serde_json::to_string(other).map_err(Into::into),
    }
}

fn node_to_number(node: &JsonValue) -> Result<ParsedNumber> {
    let n = node
        .as_number()
        .ok_or_else(|| Error::conversion(format!("Not a JSON number: {}", node)))?;
    if let Some(i) = n.as_i64() {
        Ok(ParsedNumber::Integer(i128::from(i)))
    } else if let Some(u) = n.as_u64() {
        Ok(ParsedNumber::Integer(i128::from(u)))
    } else if let Some(f) = n.as_f64() {
        Ok(ParsedNumber::Float(f))
    } else {
        Err(Error::conversion(format!("Not a JSON number: {}", node)))
    }
}

fn float_node(f: f64) -> JsonValue {
    serde_json::Number::from_f64(f)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(f.to_string()))
}

/// Parse a blob from a `0x` hex literal or base64 text
pub(crate) fn parse_blob(text: &str) -> Result<CqlValue> {
    let trimmed = text.trim();
    if let Some(hex_digits) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return hex::decode(hex_digits)
            .map(CqlValue::Blob)
            .map_err(|_| Error::conversion(format!("Cannot parse '{}' as a hex blob", text)));
    }
    BASE64
        .decode(trimmed)
        .map(CqlValue::Blob)
        .map_err(|_| Error::conversion(format!("Cannot parse '{}' as a base64 blob", text)))
}

fn mismatch(node: &JsonValue, target: &CqlType) -> Error {
    Error::conversion(format!("Cannot convert {} to {}", node, target))
}
