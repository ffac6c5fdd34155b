mod error;

use bigdecimal::{BigDecimal, FromPrimitive};
use chrono::prelude::*;
use serde::ser::SerializeMap;
use serde::{Serialize, ser::Serializer};
use std::{convert::TryFrom, fmt, str::FromStr};
use uuid::Uuid;

pub use error::ConversionFailure;

pub type RecordValueResult<T> = std::result::Result<T, ConversionFailure>;
pub type RecordListValue = Vec<RecordValue>;

/// A dynamically typed value of a single record cell, as handed back by the
/// database layer or produced by decoding aggregated JSON.
///
/// Temporal and binary values are leaves of the value tree: only `List` and
/// `Object` ever contain further values.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize)]
#[serde(untagged)]
pub enum RecordValue {
    String(String),
    Boolean(bool),
    Int(i64),
    Uuid(Uuid),
    List(RecordListValue),

    /// Raw JSON text of a column whose declared type is json. Kept opaque;
    /// the engine never restructures it.
    Json(String),

    /// A collection of key-value pairs constituting an object. Field order is
    /// insertion order and is preserved through serialization.
    #[serde(serialize_with = "serialize_object")]
    Object(Vec<(String, RecordValue)>),

    #[serde(serialize_with = "serialize_null")]
    Null,

    #[serde(serialize_with = "serialize_date")]
    DateTime(DateTime<FixedOffset>),

    #[serde(serialize_with = "serialize_decimal")]
    Float(BigDecimal),

    #[serde(serialize_with = "serialize_bytes")]
    Bytes(Vec<u8>),
}

/// Stringify a date to the following format
/// 1999-05-01T00:00:00.000Z
pub fn stringify_datetime(datetime: &DateTime<FixedOffset>) -> String {
    datetime.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an RFC 3339 and ISO 8601 date and time string such as
/// 1996-12-19T16:39:57-08:00, then returns a new DateTime with a parsed
/// FixedOffset.
pub fn parse_datetime(datetime: &str) -> chrono::ParseResult<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(datetime)
}

pub fn encode_bytes(bytes: &[u8]) -> String {
    use base64::prelude::*;
    BASE64_STANDARD.encode(bytes)
}

pub fn decode_bytes(s: &str) -> RecordValueResult<Vec<u8>> {
    use base64::prelude::*;
    BASE64_STANDARD
        .decode(s)
        .map_err(|_| ConversionFailure::new("base64 encoded bytes", "RecordValue::Bytes"))
}

impl TryFrom<serde_json::Value> for RecordValue {
    type Error = ConversionFailure;

    fn try_from(v: serde_json::Value) -> RecordValueResult<Self> {
        match v {
            serde_json::Value::String(s) => Ok(RecordValue::String(s)),
            serde_json::Value::Array(v) => {
                let vals: RecordValueResult<Vec<RecordValue>> =
                    v.into_iter().map(RecordValue::try_from).collect();
                Ok(RecordValue::List(vals?))
            }
            serde_json::Value::Null => Ok(RecordValue::Null),
            serde_json::Value::Bool(b) => Ok(RecordValue::Boolean(b)),
            serde_json::Value::Number(num) => {
                if let Some(i) = num.as_i64() {
                    Ok(RecordValue::Int(i))
                } else {
                    let fl = num
                        .as_f64()
                        .ok_or_else(|| ConversionFailure::new("JSON number", "RecordValue"))?;
                    let dec = BigDecimal::from_f64(fl)
                        .ok_or_else(|| ConversionFailure::new("f64", "Decimal"))?
                        .normalized();

                    Ok(RecordValue::Float(dec))
                }
            }
            serde_json::Value::Object(obj) => {
                let mut pairs = Vec::with_capacity(obj.len());

                for (k, v) in obj {
                    pairs.push((k, RecordValue::try_from(v)?));
                }

                Ok(RecordValue::Object(pairs))
            }
        }
    }
}

fn serialize_date<S>(date: &DateTime<FixedOffset>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    stringify_datetime(date).serialize(serializer)
}

fn serialize_bytes<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    encode_bytes(bytes).serialize(serializer)
}

fn serialize_null<S>(serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    Option::<u8>::None.serialize(serializer)
}

fn serialize_decimal<S>(decimal: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    decimal
        .to_string()
        .parse::<f64>()
        .map_err(serde::ser::Error::custom)?
        .serialize(serializer)
}

fn serialize_object<S>(obj: &Vec<(String, RecordValue)>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(obj.len()))?;

    for (k, v) in obj {
        map.serialize_entry(k, v)?;
    }

    map.end()
}

impl RecordValue {
    pub fn as_string(&self) -> Option<&str> {
        match self {
            RecordValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            RecordValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            RecordValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RecordValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RecordValue::Null)
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            RecordValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_list(self) -> Option<RecordListValue> {
        match self {
            RecordValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<Vec<(String, RecordValue)>> {
        match self {
            RecordValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&[(String, RecordValue)]> {
        match self {
            RecordValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn new_float(float: f64) -> RecordValue {
        RecordValue::Float(BigDecimal::from_f64(float).unwrap_or_default())
    }

    pub fn new_datetime(datetime: &str) -> RecordValue {
        RecordValue::DateTime(parse_datetime(datetime).expect("invalid RFC 3339 datetime"))
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordValue::String(x) => x.fmt(f),
            RecordValue::Float(x) => x.fmt(f),
            RecordValue::Boolean(x) => x.fmt(f),
            RecordValue::DateTime(x) => x.fmt(f),
            RecordValue::Int(x) => x.fmt(f),
            RecordValue::Null => "null".fmt(f),
            RecordValue::Uuid(x) => x.fmt(f),
            RecordValue::Json(x) => x.fmt(f),
            RecordValue::List(x) => {
                let as_string = format!("{x:?}");
                as_string.fmt(f)
            }
            RecordValue::Bytes(b) => encode_bytes(b).fmt(f),
            RecordValue::Object(pairs) => {
                let joined = pairs
                    .iter()
                    .map(|(key, value)| format!(r#""{key}": {value}"#))
                    .collect::<Vec<_>>()
                    .join(", ");

                write!(f, "{{ {joined} }}")
            }
        }
    }
}

impl From<&str> for RecordValue {
    fn from(s: &str) -> Self {
        RecordValue::from(s.to_string())
    }
}

impl From<String> for RecordValue {
    fn from(s: String) -> Self {
        RecordValue::String(s)
    }
}

impl From<bool> for RecordValue {
    fn from(b: bool) -> Self {
        RecordValue::Boolean(b)
    }
}

impl From<i32> for RecordValue {
    fn from(i: i32) -> Self {
        RecordValue::Int(i64::from(i))
    }
}

impl From<i64> for RecordValue {
    fn from(i: i64) -> Self {
        RecordValue::Int(i)
    }
}

impl From<usize> for RecordValue {
    fn from(u: usize) -> Self {
        RecordValue::Int(u as i64)
    }
}

impl From<Uuid> for RecordValue {
    fn from(s: Uuid) -> Self {
        RecordValue::Uuid(s)
    }
}

impl From<RecordListValue> for RecordValue {
    fn from(s: RecordListValue) -> Self {
        RecordValue::List(s)
    }
}

impl TryFrom<f64> for RecordValue {
    type Error = ConversionFailure;

    fn try_from(f: f64) -> RecordValueResult<RecordValue> {
        BigDecimal::from_f64(f)
            .map(RecordValue::Float)
            .ok_or_else(|| ConversionFailure::new("f64", "Decimal"))
    }
}

impl TryFrom<RecordValue> for i64 {
    type Error = ConversionFailure;

    fn try_from(value: RecordValue) -> RecordValueResult<i64> {
        match value {
            RecordValue::Int(i) => Ok(i),
            _ => Err(ConversionFailure::new("RecordValue", "i64")),
        }
    }
}

impl TryFrom<RecordValue> for String {
    type Error = ConversionFailure;

    fn try_from(pv: RecordValue) -> RecordValueResult<String> {
        match pv {
            RecordValue::String(s) => Ok(s),
            _ => Err(ConversionFailure::new("RecordValue", "String")),
        }
    }
}

impl FromStr for RecordValue {
    type Err = ConversionFailure;

    fn from_str(s: &str) -> RecordValueResult<Self> {
        Ok(RecordValue::String(s.to_owned()))
    }
}
