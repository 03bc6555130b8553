//! Codec registry and conversion context
//!
//! Codecs convert between one external representation and one internal
//! CQL type. They are looked up by `(external format, target type)` in
//! the registry, built once from the codec configuration, and safe for
//! concurrent read-only use afterwards.

pub mod geo;
pub mod json;
pub mod number;
pub mod string;
pub mod temporal;

use crate::config::{CodecConfig, OverflowStrategy, RoundingMode};
use crate::error::{Error, Result};
use crate::types::{CqlType, CqlValue};
use number::{NumberFormat, ParsedNumber};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use temporal::TemporalFormat;

/// The external representation kind a codec converts from and to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalFormat {
    /// Plain text fields (CSV and friends)
    String,
    /// JSON nodes
    Json,
}

impl fmt::Display for ExternalFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalFormat::String => write!(f, "string"),
            ExternalFormat::Json => write!(f, "json"),
        }
    }
}

/// A raw external value as handed over by the connector
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalValue {
    /// Native null (missing field, JSON null)
    Null,
    /// A text field
    Text(String),
    /// A JSON node
    Json(JsonValue),
}

impl ExternalValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ExternalValue::Null | ExternalValue::Json(JsonValue::Null))
    }
}

/// Bidirectional converter between one external representation and one
/// internal CQL type.
///
/// Implementations are stateless after construction and shared across
/// worker threads.
pub trait ConvertingCodec: Send + Sync {
    /// The internal type this codec produces
    fn target(&self) -> &CqlType;

    /// Convert an external value to the internal type; the configured
    /// null sentinels convert to `CqlValue::Null`
    fn external_to_internal(&self, external: &ExternalValue) -> Result<CqlValue>;

    /// Convert an internal value back to external representation; null
    /// renders as the first configured sentinel (string) or JSON null
    fn internal_to_external(&self, internal: &CqlValue) -> Result<ExternalValue>;
}

/// Shared conversion rules derived from the codec configuration
#[derive(Debug)]
pub struct ConversionContext {
    pub number: NumberFormat,
    pub temporal: TemporalFormat,
    boolean_words: HashMap<String, bool>,
    true_word: String,
    false_word: String,
    pub boolean_numbers: (i64, i64),
    null_strings: Vec<String>,
    pub overflow: OverflowStrategy,
    pub rounding: RoundingMode,
}

impl ConversionContext {
    pub fn new(config: &CodecConfig) -> Result<Self> {
        let mut boolean_words = HashMap::new();
        let mut true_word = String::from("true");
        let mut false_word = String::from("false");
        for (i, pair) in config.boolean_strings.iter().enumerate() {
            let (t, f) = pair.split_once(':').ok_or_else(|| {
                Error::configuration(format!(
                    "Invalid boolean word pair '{}': expecting TRUE_WORD:FALSE_WORD",
                    pair
                ))
            })?;
            if i == 0 {
                true_word = t.to_lowercase();
                false_word = f.to_lowercase();
            }
            boolean_words.insert(t.to_lowercase(), true);
            boolean_words.insert(f.to_lowercase(), false);
        }
        Ok(Self {
            number: NumberFormat::new(config.locale),
            temporal: TemporalFormat::new(config)?,
            boolean_words,
            true_word,
            false_word,
            boolean_numbers: config.boolean_numbers,
            null_strings: config.null_strings.clone(),
            overflow: config.overflow_strategy,
            rounding: config.rounding_mode,
        })
    }

    /// Check if a text value is one of the configured null sentinels
    pub fn is_null_text(&self, text: &str) -> bool {
        self.null_strings.iter().any(|s| s == text)
    }

    /// The sentinel null renders as on text output
    pub fn null_text(&self) -> String {
        self.null_strings.first().cloned().unwrap_or_default()
    }

    /// Parse a number, falling back to boolean words and then to
    /// temporal text interpreted as an epoch offset.
    pub fn parse_number(&self, text: &str) -> Result<ParsedNumber> {
        if let Ok(number) = self.number.parse(text) {
            return Ok(number);
        }
        if let Some(&value) = self.boolean_words.get(&text.trim().to_lowercase()) {
            let (t, f) = self.boolean_numbers;
            return Ok(ParsedNumber::Integer(i128::from(if value { t } else { f })));
        }
        if let Ok(instant) = self.temporal.parse_timestamp(text) {
            return Ok(ParsedNumber::Integer(i128::from(
                self.temporal.to_units(instant),
            )));
        }
        Err(Error::conversion(format!(
            "Cannot parse '{}' as a number",
            text
        )))
    }

    /// Parse a boolean from words, then from the configured numbers
    pub fn parse_boolean(&self, text: &str) -> Result<bool> {
        let lowered = text.trim().to_lowercase();
        if let Some(&value) = self.boolean_words.get(&lowered) {
            return Ok(value);
        }
        if let Ok(ParsedNumber::Integer(i)) = self.number.parse(text) {
            let (t, f) = self.boolean_numbers;
            if i == i128::from(t) {
                return Ok(true);
            }
            if i == i128::from(f) {
                return Ok(false);
            }
        }
        Err(Error::conversion(format!(
            "Cannot parse '{}' as a boolean",
            text
        )))
    }

    /// The word a boolean renders as on text output
    pub fn format_boolean(&self, value: bool) -> String {
        if value {
            self.true_word.clone()
        } else {
            self.false_word.clone()
        }
    }

    /// Narrow a parsed number into a numeric, temporal or boolean value
    /// of the target type.
    pub fn number_to_value(&self, number: ParsedNumber, target: &CqlType) -> Result<CqlValue> {
        let bounded = |min: i128, max: i128, name: &str| -> Result<i128> {
            number::narrow_to_bounded(number, min, max, name, self.overflow, self.rounding)
        };
        match target {
            CqlType::TinyInt => Ok(CqlValue::TinyInt(
                bounded(i128::from(i8::MIN), i128::from(i8::MAX), "tinyint")? as i8,
            )),
            CqlType::SmallInt => Ok(CqlValue::SmallInt(
                bounded(i128::from(i16::MIN), i128::from(i16::MAX), "smallint")? as i16,
            )),
            CqlType::Int => Ok(CqlValue::Int(
                bounded(i128::from(i32::MIN), i128::from(i32::MAX), "int")? as i32,
            )),
            CqlType::Bigint => Ok(CqlValue::Bigint(
                bounded(i128::from(i64::MIN), i128::from(i64::MAX), "bigint")? as i64,
            )),
            CqlType::Counter => Ok(CqlValue::Counter(
                bounded(i128::from(i64::MIN), i128::from(i64::MAX), "counter")? as i64,
            )),
            CqlType::Varint => Ok(CqlValue::Varint(number::narrow_to_integer(
                number,
                self.overflow,
                self.rounding,
            )?)),
            CqlType::Float => Ok(CqlValue::Float(number::widen_to_f64(number) as f32)),
            CqlType::Double => Ok(CqlValue::Double(number::widen_to_f64(number))),
            CqlType::Decimal => {
                let (unscaled, scale) = number::to_decimal(number)?;
                Ok(CqlValue::Decimal { unscaled, scale })
            }
            CqlType::Timestamp => {
                let units =
                    bounded(i128::from(i64::MIN), i128::from(i64::MAX), "timestamp")? as i64;
                Ok(CqlValue::Timestamp(self.temporal.from_units(units)))
            }
            CqlType::Boolean => {
                let value = number::narrow_to_integer(number, self.overflow, self.rounding)?;
                let (t, f) = self.boolean_numbers;
                if value == i128::from(t) {
                    Ok(CqlValue::Boolean(true))
                } else if value == i128::from(f) {
                    Ok(CqlValue::Boolean(false))
                } else {
                    Err(Error::conversion(format!(
                        "Cannot convert {} to boolean",
                        value
                    )))
                }
            }
            other => Err(Error::conversion(format!(
                "Cannot convert a number to {}",
                other
            ))),
        }
    }
}

/// Lookup table from `(external format, target type)` to a codec
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    ctx: Arc<ConversionContext>,
}

impl CodecRegistry {
    /// Build a registry from the codec configuration.
    ///
    /// Fails fast on invalid configuration (bad boolean pairs, bad time
    /// zone) so that no conversion error surfaces later for them.
    pub fn new(config: &CodecConfig) -> Result<Self> {
        Ok(Self {
            ctx: Arc::new(ConversionContext::new(config)?),
        })
    }

    /// Look up the codec converting between the given external format
    /// and internal type.
    pub fn codec_for(
        &self,
        format: ExternalFormat,
        target: &CqlType,
    ) -> Result<Arc<dyn ConvertingCodec>> {
        match format {
            ExternalFormat::String => string::codec_for(self.ctx.clone(), target),
            ExternalFormat::Json => json::codec_for(self.ctx.clone(), target),
        }
        .ok_or_else(|| {
            Error::no_codec_found(format!(
                "No codec found to convert between external format '{}' and CQL type {}",
                format, target
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CodecRegistry {
        CodecRegistry::new(&CodecConfig::default()).unwrap()
    }

    #[test]
    fn test_codec_lookup() {
        let registry = registry();
        assert!(registry
            .codec_for(ExternalFormat::String, &CqlType::Bigint)
            .is_ok());
        assert!(registry
            .codec_for(ExternalFormat::Json, &CqlType::List(Box::new(CqlType::Int)))
            .is_ok());
    }

    #[test]
    fn test_no_codec_found_names_both_keys() {
        let registry = registry();
        let err = registry
            .codec_for(ExternalFormat::String, &CqlType::Udt("address".into()))
            .err()
            .unwrap();
        let message = err.to_string();
        assert!(message.contains("string"));
        assert!(message.contains("address"));
    }

    #[test]
    fn test_parse_number_boolean_and_temporal_fallbacks() {
        let ctx = ConversionContext::new(&CodecConfig::default()).unwrap();
        assert_eq!(
            ctx.parse_number("TRUE").unwrap(),
            ParsedNumber::Integer(1)
        );
        assert_eq!(
            ctx.parse_number("2000-01-01T00:00:00Z").unwrap(),
            ParsedNumber::Integer(946_684_800_000)
        );
        assert!(ctx.parse_number("garbage").is_err());
    }

    #[test]
    fn test_parse_boolean_words_and_numbers() {
        let ctx = ConversionContext::new(&CodecConfig::default()).unwrap();
        assert!(ctx.parse_boolean("Y").unwrap());
        assert!(!ctx.parse_boolean("FALSE").unwrap());
        assert!(ctx.parse_boolean("1").unwrap());
        assert!(ctx.parse_boolean("maybe").is_err());
    }

    #[test]
    fn test_invalid_boolean_pair_rejected() {
        let mut config = CodecConfig::default();
        config.boolean_strings = vec!["TRUEFALSE".into()];
        assert!(CodecRegistry::new(&config).is_err());
    }
}
