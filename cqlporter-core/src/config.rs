//! Configuration for CQLPorter's planning and conversion core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric overflow handling when narrowing a parsed number to the
/// target CQL type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowStrategy {
    /// Fail when the value has a fractional part or exceeds the target range
    Reject,
    /// Drop the fractional part per the rounding mode and saturate on range
    Truncate,
}

/// Rounding applied when `OverflowStrategy::Truncate` drops a
/// fractional part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundingMode {
    /// Round toward zero
    Down,
    /// Round away from zero
    Up,
    /// Round toward negative infinity
    Floor,
    /// Round toward positive infinity
    Ceiling,
    /// Round to nearest, ties away from zero
    HalfUp,
    /// Round to nearest, ties toward even
    HalfEven,
}

/// Time unit for numeric temporal values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Convert a count of this unit to nanoseconds
    pub fn to_nanos(self, amount: i64) -> i128 {
        let amount = i128::from(amount);
        match self {
            TimeUnit::Nanoseconds => amount,
            TimeUnit::Microseconds => amount * 1_000,
            TimeUnit::Milliseconds => amount * 1_000_000,
            TimeUnit::Seconds => amount * 1_000_000_000,
            TimeUnit::Minutes => amount * 60_000_000_000,
            TimeUnit::Hours => amount * 3_600_000_000_000,
            TimeUnit::Days => amount * 86_400_000_000_000,
        }
    }

    /// Convert nanoseconds to a truncated count of this unit
    pub fn from_nanos(self, nanos: i128) -> i64 {
        let divisor: i128 = match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Minutes => 60_000_000_000,
            TimeUnit::Hours => 3_600_000_000_000,
            TimeUnit::Days => 86_400_000_000_000,
        };
        (nanos / divisor) as i64
    }
}

/// Decimal separators for locale-aware number parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberLocale {
    /// Thousands grouping separator, e.g. `,` for US locales
    pub grouping_separator: char,
    /// Decimal point separator, e.g. `.` for US locales
    pub decimal_separator: char,
}

impl Default for NumberLocale {
    fn default() -> Self {
        Self {
            grouping_separator: ',',
            decimal_separator: '.',
        }
    }
}

/// Per-codec conversion settings, shared by every codec instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Number parsing locale
    pub locale: NumberLocale,

    /// Ordered null sentinels; any of them maps to null on input and
    /// null renders as the first one on output
    pub null_strings: Vec<String>,

    /// Boolean word pairs in `TRUE_WORD:FALSE_WORD` form, matched
    /// case-insensitively
    pub boolean_strings: Vec<String>,

    /// Numeric representations of (true, false)
    pub boolean_numbers: (i64, i64),

    /// Primary timestamp format (chrono syntax); ISO-8601 when absent
    pub timestamp_format: Option<String>,

    /// Primary date format (chrono syntax); ISO-8601 when absent
    pub date_format: Option<String>,

    /// Primary time format (chrono syntax); ISO-8601 when absent
    pub time_format: Option<String>,

    /// Time zone applied when parsing zone-less temporals, as a fixed
    /// offset (`+02:00`) or `UTC`
    pub time_zone: String,

    /// Unit of numeric temporal values
    pub time_unit: TimeUnit,

    /// Epoch that numeric temporal values count from
    pub epoch: DateTime<Utc>,

    /// Numeric overflow handling
    pub overflow_strategy: OverflowStrategy,

    /// Rounding mode used by `OverflowStrategy::Truncate`
    pub rounding_mode: RoundingMode,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            locale: NumberLocale::default(),
            null_strings: vec![String::new()],
            boolean_strings: vec![
                "1:0".into(),
                "Y:N".into(),
                "T:F".into(),
                "YES:NO".into(),
                "TRUE:FALSE".into(),
            ],
            boolean_numbers: (1, 0),
            timestamp_format: None,
            date_format: None,
            time_format: None,
            time_zone: "UTC".into(),
            time_unit: TimeUnit::Milliseconds,
            epoch: DateTime::UNIX_EPOCH,
            overflow_strategy: OverflowStrategy::Reject,
            rounding_mode: RoundingMode::HalfEven,
        }
    }
}

/// Statistics kinds a counting run can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatsMode {
    /// Total row count
    Global,
    /// Row counts per hosting node
    Hosts,
    /// Row counts per token range
    Ranges,
    /// Row counts for the biggest partitions
    Partitions,
}

/// Schema-level settings: what to read or write, and how fields map to
/// columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Target keyspace; exclusive with a keyspace-qualified query
    pub keyspace: Option<String>,

    /// Target table or materialized view; exclusive with `query`
    pub table: Option<String>,

    /// Custom CQL statement; exclusive with `table`
    pub query: Option<String>,

    /// Mapping specification string; absent means inferred
    pub mapping: Option<String>,

    /// Leave bound variables unset instead of binding null
    pub null_to_unset: bool,

    /// Static TTL in seconds applied to every written row
    pub query_ttl: Option<u32>,

    /// Static write timestamp applied to every written row
    pub query_timestamp: Option<DateTime<Utc>>,

    /// Target number of token-range splits for reads
    pub splits: usize,

    /// Statistics kinds for counting runs
    pub stats: Vec<StatsMode>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            keyspace: None,
            table: None,
            query: None,
            mapping: None,
            null_to_unset: true,
            query_ttl: None,
            query_timestamp: None,
            splits: 8,
            stats: vec![StatsMode::Global],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_unit_round_trip() {
        assert_eq!(TimeUnit::Milliseconds.to_nanos(1), 1_000_000);
        assert_eq!(TimeUnit::Seconds.from_nanos(1_500_000_000), 1);
        assert_eq!(TimeUnit::Days.to_nanos(1), 86_400_000_000_000);
    }

    #[test]
    fn test_codec_config_defaults() {
        let config = CodecConfig::default();
        assert_eq!(config.null_strings, vec![String::new()]);
        assert_eq!(config.boolean_numbers, (1, 0));
        assert_eq!(config.overflow_strategy, OverflowStrategy::Reject);
    }

    #[test]
    fn test_schema_config_defaults() {
        let config = SchemaConfig::default();
        assert!(config.null_to_unset);
        assert_eq!(config.splits, 8);
        assert_eq!(config.stats, vec![StatsMode::Global]);
    }
}
