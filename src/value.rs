//! value: модель значений документного стора.
//!
//! Документ: упорядоченная (как вернул стор) карта полей. Значения:
//! примитивы, массивы, вложенные карты и один зарезервированный скаляр -
//! Timestamp (store-native время).
//!
//! Порядок полей сохраняется (IndexMap): canonical JSON пишется в том же
//! порядке, в каком поля пришли из стора.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Поля документа (или вложенной карты).
pub type Fields = IndexMap<String, StoreValue>;

/// Тело документа.
pub type Document = Fields;

/// Serde-форма (`{"type": "...", "value": ...}`) используется только файлом
/// LocalStore; snapshot-файлы идут через `Converter`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StoreValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Array(Vec<StoreValue>),
    Map(Fields),
}

impl StoreValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            StoreValue::Null => "null",
            StoreValue::Bool(_) => "bool",
            StoreValue::Integer(_) => "integer",
            StoreValue::Double(_) => "double",
            StoreValue::String(_) => "string",
            StoreValue::Timestamp(_) => "timestamp",
            StoreValue::Array(_) => "array",
            StoreValue::Map(_) => "map",
        }
    }

    pub fn as_map(&self) -> Option<&Fields> {
        match self {
            StoreValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<&str> for StoreValue {
    fn from(s: &str) -> Self {
        StoreValue::String(s.to_string())
    }
}

impl From<String> for StoreValue {
    fn from(s: String) -> Self {
        StoreValue::String(s)
    }
}

impl From<i64> for StoreValue {
    fn from(v: i64) -> Self {
        StoreValue::Integer(v)
    }
}

impl From<f64> for StoreValue {
    fn from(v: f64) -> Self {
        StoreValue::Double(v)
    }
}

impl From<bool> for StoreValue {
    fn from(v: bool) -> Self {
        StoreValue::Bool(v)
    }
}

impl From<DateTime<Utc>> for StoreValue {
    fn from(v: DateTime<Utc>) -> Self {
        StoreValue::Timestamp(v)
    }
}

impl From<Fields> for StoreValue {
    fn from(v: Fields) -> Self {
        StoreValue::Map(v)
    }
}

/// Deep merge (set with merge=true): вложенные карты сливаются по полям,
/// всё остальное заменяется значением из `patch`.
pub fn merge_fields(target: &mut Fields, patch: Fields) {
    for (key, value) in patch {
        match (target.get_mut(&key), value) {
            (Some(StoreValue::Map(existing)), StoreValue::Map(incoming)) => {
                merge_fields(existing, incoming);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}
