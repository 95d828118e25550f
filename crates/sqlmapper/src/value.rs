//! Dynamic values and records.
//!
//! [`Value`] is the scalar model shared by filters, write arguments and result rows.
//! [`Record`] is an insertion-ordered `column -> Value` mapping used both as the
//! input of write statements and as the shape of every returned row.

use crate::error::{OrmError, OrmResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A single SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL `NULL`
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Exact decimal (`DECIMAL` columns)
    #[cfg(feature = "rust_decimal")]
    Decimal(rust_decimal::Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// A list of values, used for `IN (...)` conditions only.
    List(Vec<Value>),
    /// Raw marker: inserted into the statement verbatim, never escaped.
    ///
    /// # Safety
    /// Be careful with SQL injection when using raw values.
    Raw(String),
}

impl Value {
    /// Create a raw marker value.
    pub fn raw(sql: impl Into<String>) -> Self {
        Value::Raw(sql.into())
    }

    /// Create a binary value.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(bytes.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this is a scalar (neither a list nor a raw marker).
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Value::List(_) | Value::Raw(_))
    }

    /// Borrow the text content, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a JSON value.
    ///
    /// Objects are only accepted in the raw-marker shape `{"raw": "<sql>"}`.
    pub fn from_json(value: serde_json::Value) -> OrmResult<Self> {
        use serde_json::Value as J;

        Ok(match value {
            J::Null => Value::Null,
            J::Bool(b) => Value::Bool(b),
            J::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            J::String(s) => Value::Text(s),
            J::Array(items) => Value::List(
                items
                    .into_iter()
                    .map(Value::from_json)
                    .collect::<OrmResult<Vec<_>>>()?,
            ),
            J::Object(map) => match raw_marker(&map) {
                Some(raw) => Value::Raw(raw.to_string()),
                None => {
                    return Err(OrmError::validation(
                        "object values are only allowed as {\"raw\": \"...\"} markers",
                    ));
                }
            },
        })
    }

    /// Convert into a JSON value (used by [`Record::deserialize`]).
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;

        match self {
            Value::Null => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Int(i) => J::from(*i),
            Value::UInt(u) => J::from(*u),
            Value::Float(f) => serde_json::Number::from_f64(*f).map_or(J::Null, J::Number),
            #[cfg(feature = "rust_decimal")]
            Value::Decimal(d) => J::String(d.to_string()),
            Value::Text(s) | Value::Raw(s) => J::String(s.clone()),
            Value::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) => J::String(s.to_string()),
                Err(_) => J::Array(b.iter().map(|x| J::from(*x)).collect()),
            },
            Value::Date(d) => J::String(d.format("%Y-%m-%d").to_string()),
            Value::DateTime(dt) => J::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            Value::List(items) => J::Array(items.iter().map(Value::to_json).collect()),
        }
    }
}

/// Returns the raw SQL if `map` is exactly `{"raw": "<sql>"}`.
pub(crate) fn raw_marker(map: &serde_json::Map<String, serde_json::Value>) -> Option<&str> {
    if map.len() != 1 {
        return None;
    }
    map.get("raw").and_then(|v| v.as_str())
}

macro_rules! impl_from_int {
    ($variant:ident as $target:ty: $($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v as $target)
                }
            }
        )*
    };
}

impl_from_int!(Int as i64: i8, i16, i32, i64);
impl_from_int!(UInt as u64: u8, u16, u32, u64, usize);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Value {
    fn from(v: DateTime<Tz>) -> Self {
        Value::DateTime(v.naive_utc())
    }
}

impl From<uuid::Uuid> for Value {
    fn from(v: uuid::Uuid) -> Self {
        Value::Text(v.to_string())
    }
}

#[cfg(feature = "rust_decimal")]
impl From<rust_decimal::Decimal> for Value {
    fn from(v: rust_decimal::Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

// ==================== Typed extraction ====================

/// Types that can be extracted from a [`Value`].
///
/// Rows read over the MySQL text protocol carry most scalars as text, so numeric
/// and temporal impls also accept their textual form.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, String>;
}

fn unexpected<T>(value: &Value, expected: &str) -> Result<T, String> {
    Err(format!("expected {expected}, got {value:?}"))
}

macro_rules! impl_from_value_int {
    ($($t:ty),*) => {
        $(
            impl FromValue for $t {
                fn from_value(value: &Value) -> Result<Self, String> {
                    match value {
                        Value::Int(i) => <$t>::try_from(*i).map_err(|e| e.to_string()),
                        Value::UInt(u) => <$t>::try_from(*u).map_err(|e| e.to_string()),
                        Value::Bool(b) => Ok(<$t>::from(*b)),
                        Value::Text(s) => s.trim().parse::<$t>().map_err(|e| e.to_string()),
                        other => unexpected(other, stringify!($t)),
                    }
                }
            }
        )*
    };
}

impl_from_value_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            Value::UInt(u) => Ok(*u as f64),
            Value::Text(s) => s.trim().parse().map_err(|e: std::num::ParseFloatError| e.to_string()),
            other => unexpected(other, "f64"),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self, String> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::UInt(u) => Ok(*u != 0),
            Value::Text(s) => match s.trim() {
                "1" | "true" | "TRUE" => Ok(true),
                "0" | "false" | "FALSE" => Ok(false),
                other => Err(format!("expected boolean, got {other:?}")),
            },
            other => unexpected(other, "bool"),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Bytes(b) => String::from_utf8(b.clone()).map_err(|e| e.to_string()),
            Value::Int(i) => Ok(i.to_string()),
            Value::UInt(u) => Ok(u.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            #[cfg(feature = "rust_decimal")]
            Value::Decimal(d) => Ok(d.to_string()),
            other => unexpected(other, "text"),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            other => unexpected(other, "bytes"),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::DateTime(dt) => Ok(dt.date()),
            Value::Text(s) => {
                NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| e.to_string())
            }
            other => unexpected(other, "date"),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            Value::Date(d) => d
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| format!("invalid date {d}")),
            Value::Text(s) => {
                let s = s.trim();
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
                    .map_err(|e| e.to_string())
            }
            other => unexpected(other, "datetime"),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self, String> {
        NaiveDateTime::from_value(value).map(|naive| Utc.from_utc_datetime(&naive))
    }
}

impl FromValue for uuid::Uuid {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Text(s) => uuid::Uuid::parse_str(s.trim()).map_err(|e| e.to_string()),
            Value::Bytes(b) => uuid::Uuid::from_slice(b).map_err(|e| e.to_string()),
            other => unexpected(other, "uuid"),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Text(s) => serde_json::from_str(s).map_err(|e| e.to_string()),
            other => Ok(other.to_json()),
        }
    }
}

#[cfg(feature = "rust_decimal")]
impl FromValue for rust_decimal::Decimal {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Decimal(d) => Ok(*d),
            Value::Int(i) => Ok(rust_decimal::Decimal::from(*i)),
            Value::UInt(u) => Ok(rust_decimal::Decimal::from(*u)),
            Value::Text(s) => s.trim().parse().map_err(|e: rust_decimal::Error| e.to_string()),
            other => unexpected(other, "decimal"),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

// ==================== Record ====================

/// An insertion-ordered mapping from column name to [`Value`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Wrap driver columns as-is. Repeated names are kept until the row is normalized.
    pub fn from_columns(columns: Vec<(String, Value)>) -> Self {
        Self { entries: columns }
    }

    /// Insert a value, replacing (in place) any previous value for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Builder-style [`Record::insert`].
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Get a typed column value.
    ///
    /// A missing column is a decode error.
    pub fn try_get<T: FromValue>(&self, column: &str) -> OrmResult<T> {
        let value = self
            .get(column)
            .ok_or_else(|| OrmError::decode(column, "column not found"))?;
        T::from_value(value).map_err(|message| OrmError::decode(column, message))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert into a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// Deserialize this record into any `serde` type.
    ///
    /// Column names are used verbatim as field names.
    pub fn deserialize<T: DeserializeOwned>(&self) -> OrmResult<T> {
        Ok(serde_json::from_value(self.to_json())?)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Build a [`Record`] from `key => value` pairs.
///
/// ```ignore
/// let args = record! { "firstName" => "John", "age" => 42 };
/// ```
#[macro_export]
macro_rules! record {
    () => { $crate::Record::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::Record::new();
        $( record.insert($key, $value); )+
        record
    }};
}

// ==================== Serialization hook ====================

/// Anything that can present itself as a plain `column -> value` mapping.
///
/// Filters and write arguments accept any implementor, so domain objects can be
/// passed directly to the query builder.
pub trait ToRecord {
    fn to_record(&self) -> OrmResult<Record>;
}

impl ToRecord for Record {
    fn to_record(&self) -> OrmResult<Record> {
        Ok(self.clone())
    }
}

impl ToRecord for serde_json::Map<String, serde_json::Value> {
    fn to_record(&self) -> OrmResult<Record> {
        let mut record = Record::with_capacity(self.len());
        for (key, value) in self {
            let value = Value::from_json(value.clone())
                .map_err(|e| OrmError::validation(format!("field '{key}': {e}")))?;
            record.insert(key.clone(), value);
        }
        Ok(record)
    }
}

impl ToRecord for serde_json::Value {
    fn to_record(&self) -> OrmResult<Record> {
        match self {
            serde_json::Value::Object(map) => map.to_record(),
            other => Err(OrmError::validation(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }
}

impl<T: ToRecord + ?Sized> ToRecord for &T {
    fn to_record(&self) -> OrmResult<Record> {
        (**self).to_record()
    }
}

/// Wrapper that turns any `serde::Serialize` type into a [`ToRecord`].
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T: Serialize> ToRecord for Json<T> {
    fn to_record(&self) -> OrmResult<Record> {
        serde_json::to_value(&self.0)?.to_record()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn try_get_coerces_driver_text() {
        let row = record! { "id" => "42", "big" => Value::UInt(u64::MAX), "flag" => "1" };
        assert_eq!(row.try_get::<i64>("id").unwrap(), 42);
        assert_eq!(row.try_get::<u64>("big").unwrap(), u64::MAX);
        assert!(row.try_get::<bool>("flag").unwrap());
        assert!(matches!(
            row.try_get::<i64>("big").unwrap_err(),
            OrmError::Decode { .. }
        ));
    }

    #[test]
    fn try_get_missing_and_null() {
        let row = record! { "deleted_at" => Value::Null };
        assert_eq!(row.try_get::<Option<String>>("deleted_at").unwrap(), None);
        assert!(row.try_get::<String>("deleted_at").is_err());
        assert!(row.try_get::<Option<String>>("nope").is_err());
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut row = record! { "a" => 1, "b" => 2 };
        assert_eq!(row.insert("a", 3), Some(Value::Int(1)));
        let keys: Vec<&str> = row.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(row.get("a"), Some(&Value::Int(3)));
    }

    #[test]
    fn from_json_accepts_raw_marker_only() {
        assert_eq!(
            Value::from_json(json!({ "raw": "NOW()" })).unwrap(),
            Value::raw("NOW()")
        );
        assert_eq!(
            Value::from_json(json!([1, "a", null])).unwrap(),
            Value::List(vec![Value::Int(1), Value::from("a"), Value::Null])
        );
        assert!(Value::from_json(json!({ "nested": 1 })).unwrap_err().is_validation());
    }

    #[test]
    fn json_wrapper_and_deserialize() {
        #[derive(Serialize, Deserialize, Debug, PartialEq)]
        struct Account {
            id: u32,
            owner: String,
            closed: Option<bool>,
        }

        let account = Account {
            id: 9,
            owner: "Ann".into(),
            closed: None,
        };
        let row = Json(&account).to_record().unwrap();
        assert_eq!(row.get("owner"), Some(&Value::from("Ann")));
        assert_eq!(row.get("closed"), Some(&Value::Null));

        let back: Account = row.deserialize().unwrap();
        assert_eq!(back, account);
    }

    #[test]
    fn non_object_json_is_not_a_record() {
        assert!(json!([1, 2]).to_record().unwrap_err().is_validation());
    }
}
