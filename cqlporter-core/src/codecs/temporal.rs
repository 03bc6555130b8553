//! Temporal parsing and rendering
//!
//! Each temporal codec parses with a configured primary format, then
//! falls back to a numeric since-epoch interpretation in the configured
//! unit, then to ISO-8601.

use crate::config::{CodecConfig, TimeUnit};
use crate::error::{Error, Result};
use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, SecondsFormat,
    TimeZone, Utc,
};

/// Shared temporal conversion rules built from the codec configuration
#[derive(Debug, Clone)]
pub struct TemporalFormat {
    primary_timestamp: Option<String>,
    primary_date: Option<String>,
    primary_time: Option<String>,
    zone: FixedOffset,
    unit: TimeUnit,
    epoch: DateTime<Utc>,
}

impl TemporalFormat {
    pub fn new(config: &CodecConfig) -> Result<Self> {
        Ok(Self {
            primary_timestamp: config.timestamp_format.clone(),
            primary_date: config.date_format.clone(),
            primary_time: config.time_format.clone(),
            zone: parse_zone(&config.time_zone)?,
            unit: config.time_unit,
            epoch: config.epoch,
        })
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Parse a timestamp: primary format, then numeric since-epoch,
    /// then ISO-8601 (zoned, zone-less, date-only).
    pub fn parse_timestamp(&self, text: &str) -> Result<DateTime<Utc>> {
        let text = text.trim();
        if let Some(format) = &self.primary_timestamp {
            if let Ok(zoned) = DateTime::parse_from_str(text, format) {
                return Ok(zoned.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
                return self.zoned(naive);
            }
        }
        if let Ok(amount) = text.parse::<i64>() {
            return Ok(self.from_units(amount));
        }
        if let Ok(zoned) = DateTime::parse_from_rfc3339(text) {
            return Ok(zoned.with_timezone(&Utc));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
                return self.zoned(naive);
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return self.zoned(date.and_time(NaiveTime::MIN));
        }
        Err(Error::conversion(format!(
            "Cannot parse '{}' as a timestamp",
            text
        )))
    }

    /// Parse a date: primary format, then ISO-8601
    pub fn parse_date(&self, text: &str) -> Result<NaiveDate> {
        let text = text.trim();
        if let Some(format) = &self.primary_date {
            if let Ok(date) = NaiveDate::parse_from_str(text, format) {
                return Ok(date);
            }
        }
        if let Ok(days) = text.parse::<i64>() {
            let epoch_date = self.epoch.date_naive();
            return epoch_date
                .checked_add_signed(Duration::days(days))
                .ok_or_else(|| {
                    Error::conversion(format!("Date '{}' out of representable range", text))
                });
        }
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map_err(|_| Error::conversion(format!("Cannot parse '{}' as a date", text)))
    }

    /// Parse a time of day: primary format, then ISO-8601
    pub fn parse_time(&self, text: &str) -> Result<NaiveTime> {
        let text = text.trim();
        if let Some(format) = &self.primary_time {
            if let Ok(time) = NaiveTime::parse_from_str(text, format) {
                return Ok(time);
            }
        }
        if let Ok(nanos) = text.parse::<i64>() {
            let nanos = self.unit.to_nanos(nanos);
            if (0..86_400_000_000_000).contains(&nanos) {
                let secs = (nanos / 1_000_000_000) as u32;
                let sub = (nanos % 1_000_000_000) as u32;
                return NaiveTime::from_num_seconds_from_midnight_opt(secs, sub)
                    .ok_or_else(|| Error::conversion(format!("Invalid time value '{}'", text)));
            }
            return Err(Error::conversion(format!(
                "Time value '{}' is not within a single day",
                text
            )));
        }
        NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
            .map_err(|_| Error::conversion(format!("Cannot parse '{}' as a time", text)))
    }

    /// Render a timestamp in the primary format or canonical ISO-8601
    pub fn format_timestamp(&self, instant: DateTime<Utc>) -> String {
        match &self.primary_timestamp {
            Some(format) => instant.with_timezone(&self.zone).format(format).to_string(),
            None => instant.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }

    pub fn format_date(&self, date: NaiveDate) -> String {
        match &self.primary_date {
            Some(format) => date.format(format).to_string(),
            None => date.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn format_time(&self, time: NaiveTime) -> String {
        match &self.primary_time {
            Some(format) => time.format(format).to_string(),
            None => time.format("%H:%M:%S%.f").to_string(),
        }
    }

    /// An instant as a since-epoch count in the configured unit
    pub fn to_units(&self, instant: DateTime<Utc>) -> i64 {
        let nanos = i128::from(instant.timestamp()) * 1_000_000_000
            + i128::from(instant.timestamp_subsec_nanos())
            - i128::from(self.epoch.timestamp()) * 1_000_000_000;
        self.unit.from_nanos(nanos)
    }

    /// An instant built from a since-epoch count in the configured unit
    pub fn from_units(&self, amount: i64) -> DateTime<Utc> {
        let nanos = self.unit.to_nanos(amount);
        let secs = nanos.div_euclid(1_000_000_000) as i64;
        let sub = nanos.rem_euclid(1_000_000_000) as u32;
        self.epoch + Duration::seconds(secs) + Duration::nanoseconds(i64::from(sub))
    }

    fn zoned(&self, naive: NaiveDateTime) -> Result<DateTime<Utc>> {
        self.zone
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| Error::conversion(format!("Ambiguous local datetime: {}", naive)))
    }
}

/// Parse a fixed-offset zone specifier (`UTC`, `Z`, `+HH:MM`, `-HH:MM`)
fn parse_zone(spec: &str) -> Result<FixedOffset> {
    let spec = spec.trim();
    if spec.eq_ignore_ascii_case("utc") || spec == "Z" {
        return Ok(Utc.fix());
    }
    let (sign, rest) = match spec.as_bytes().first() {
        Some(b'+') => (1, &spec[1..]),
        Some(b'-') => (-1, &spec[1..]),
        _ => {
            return Err(Error::configuration(format!(
                "Invalid time zone: '{}'; expecting UTC or a fixed offset like +02:00",
                spec
            )))
        }
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours
        .parse()
        .map_err(|_| Error::configuration(format!("Invalid time zone: '{}'", spec)))?;
    let minutes: i32 = minutes
        .parse()
        .map_err(|_| Error::configuration(format!("Invalid time zone: '{}'", spec)))?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| Error::configuration(format!("Invalid time zone: '{}'", spec)))
}
