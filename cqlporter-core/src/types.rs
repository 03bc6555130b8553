//! CQL value and type model for CQLPorter
//!
//! The value model covers every CQL type the codecs can produce,
//! including the DSE geometry types. Values are plain data: the codecs
//! own all parsing and rendering rules.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use uuid::Uuid;

/// A CQL value as held between conversion and binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CqlValue {
    /// Null value
    Null,
    /// ASCII string
    Ascii(String),
    /// 64-bit signed integer
    Bigint(i64),
    /// Binary data
    Blob(Vec<u8>),
    /// Boolean value
    Boolean(bool),
    /// Distributed counter value
    Counter(i64),
    /// Calendar date without time
    Date(NaiveDate),
    /// Arbitrary-precision decimal as unscaled value and scale
    Decimal { unscaled: i128, scale: u32 },
    /// 64-bit floating point
    Double(f64),
    /// CQL duration (months, days, nanoseconds)
    Duration { months: i32, days: i32, nanos: i64 },
    /// 32-bit floating point
    Float(f32),
    /// IPv4 or IPv6 address
    Inet(IpAddr),
    /// 32-bit signed integer
    Int(i32),
    /// 16-bit signed integer
    SmallInt(i16),
    /// UTF-8 string
    Text(String),
    /// Time of day without date
    Time(NaiveTime),
    /// Instant with millisecond precision
    Timestamp(DateTime<Utc>),
    /// Version 1 UUID
    TimeUuid(Uuid),
    /// 8-bit signed integer
    TinyInt(i8),
    /// Any UUID
    Uuid(Uuid),
    /// Arbitrary-precision integer (bounded to 128 bits here)
    Varint(i128),
    /// DSE geometry: a single point
    Point { x: f64, y: f64 },
    /// DSE geometry: an open chain of points
    LineString(Vec<(f64, f64)>),
    /// DSE geometry: an outer ring plus optional holes
    Polygon(Vec<Vec<(f64, f64)>>),
    /// List of values
    List(Vec<CqlValue>),
    /// Set of values (Vec to preserve ordering)
    Set(Vec<CqlValue>),
    /// Map of key-value pairs
    Map(Vec<(CqlValue, CqlValue)>),
    /// Tuple with heterogeneous fields
    Tuple(Vec<CqlValue>),
    /// User defined type with type name and fields
    Udt(String, Vec<(String, CqlValue)>),
}

impl CqlValue {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, CqlValue::Null)
    }

    /// Try to read this value as an i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CqlValue::Bigint(i) | CqlValue::Counter(i) => Some(*i),
            CqlValue::Int(i) => Some(i64::from(*i)),
            CqlValue::SmallInt(i) => Some(i64::from(*i)),
            CqlValue::TinyInt(i) => Some(i64::from(*i)),
            _ => None,
        }
    }

    /// Try to read this value as a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CqlValue::Text(s) | CqlValue::Ascii(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CqlValue::Null => write!(f, "NULL"),
            CqlValue::Ascii(s) | CqlValue::Text(s) => write!(f, "'{}'", s),
            CqlValue::Bigint(i) | CqlValue::Counter(i) => write!(f, "{}", i),
            CqlValue::Blob(b) => write!(f, "0x{}", hex::encode(b)),
            CqlValue::Boolean(b) => write!(f, "{}", b),
            CqlValue::Date(d) => write!(f, "{}", d),
            CqlValue::Decimal { unscaled, scale } => {
                write!(f, "{}e-{}", unscaled, scale)
            }
            CqlValue::Double(d) => write!(f, "{}", d),
            CqlValue::Duration {
                months,
                days,
                nanos,
            } => write!(f, "{}mo{}d{}ns", months, days, nanos),
            CqlValue::Float(fl) => write!(f, "{}", fl),
            CqlValue::Inet(ip) => write!(f, "{}", ip),
            CqlValue::Int(i) => write!(f, "{}", i),
            CqlValue::SmallInt(i) => write!(f, "{}", i),
            CqlValue::Time(t) => write!(f, "{}", t),
            CqlValue::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            CqlValue::TimeUuid(u) | CqlValue::Uuid(u) => write!(f, "{}", u),
            CqlValue::TinyInt(i) => write!(f, "{}", i),
            CqlValue::Varint(i) => write!(f, "{}", i),
            CqlValue::Point { x, y } => write!(f, "POINT ({} {})", x, y),
            CqlValue::LineString(pts) => {
                write!(f, "LINESTRING (")?;
                for (i, (x, y)) in pts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", x, y)?;
                }
                write!(f, ")")
            }
            CqlValue::Polygon(rings) => {
                write!(f, "POLYGON (")?;
                for (i, ring) in rings.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "(")?;
                    for (j, (x, y)) in ring.iter().enumerate() {
                        if j > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{} {}", x, y)?;
                    }
                    write!(f, ")")?;
                }
                write!(f, ")")
            }
            CqlValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            CqlValue::Set(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
            CqlValue::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            CqlValue::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            CqlValue::Udt(name, fields) => {
                write!(f, "{}{{", name)?;
                for (i, (field, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// CQL data type enumeration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CqlType {
    Ascii,
    Bigint,
    Blob,
    Boolean,
    Counter,
    Date,
    Decimal,
    Double,
    Duration,
    Float,
    Inet,
    Int,
    SmallInt,
    Text,
    Time,
    Timestamp,
    TimeUuid,
    TinyInt,
    Uuid,
    Varint,
    Point,
    LineString,
    Polygon,
    List(Box<CqlType>),
    Set(Box<CqlType>),
    Map(Box<CqlType>, Box<CqlType>),
    Tuple(Vec<CqlType>),
    Udt(String),
}

impl CqlType {
    /// Check if this type is numeric
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            CqlType::TinyInt
                | CqlType::SmallInt
                | CqlType::Int
                | CqlType::Bigint
                | CqlType::Varint
                | CqlType::Float
                | CqlType::Double
                | CqlType::Decimal
                | CqlType::Counter
        )
    }

    /// Check if this type is one of the DSE geometry types
    pub fn is_geometry(&self) -> bool {
        matches!(self, CqlType::Point | CqlType::LineString | CqlType::Polygon)
    }

    /// Check if this type is a collection
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            CqlType::List(_) | CqlType::Set(_) | CqlType::Map(_, _)
        )
    }
}

impl fmt::Display for CqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CqlType::Ascii => write!(f, "ascii"),
            CqlType::Bigint => write!(f, "bigint"),
            CqlType::Blob => write!(f, "blob"),
            CqlType::Boolean => write!(f, "boolean"),
            CqlType::Counter => write!(f, "counter"),
            CqlType::Date => write!(f, "date"),
            CqlType::Decimal => write!(f, "decimal"),
            CqlType::Double => write!(f, "double"),
            CqlType::Duration => write!(f, "duration"),
            CqlType::Float => write!(f, "float"),
            CqlType::Inet => write!(f, "inet"),
            CqlType::Int => write!(f, "int"),
            CqlType::SmallInt => write!(f, "smallint"),
            CqlType::Text => write!(f, "text"),
            CqlType::Time => write!(f, "time"),
            CqlType::Timestamp => write!(f, "timestamp"),
            CqlType::TimeUuid => write!(f, "timeuuid"),
            CqlType::TinyInt => write!(f, "tinyint"),
            CqlType::Uuid => write!(f, "uuid"),
            CqlType::Varint => write!(f, "varint"),
            CqlType::Point => write!(f, "'PointType'"),
            CqlType::LineString => write!(f, "'LineStringType'"),
            CqlType::Polygon => write!(f, "'PolygonType'"),
            CqlType::List(inner) => write!(f, "list<{}>", inner),
            CqlType::Set(inner) => write!(f, "set<{}>", inner),
            CqlType::Map(k, v) => write!(f, "map<{}, {}>", k, v),
            CqlType::Tuple(items) => {
                write!(f, "tuple<")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ">")
            }
            CqlType::Udt(name) => write!(f, "{}", name),
        }
    }
}
