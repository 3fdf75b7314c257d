//! converter: двусторонний маппинг store-native значений ⇄ portable JSON.
//!
//! Export (`to_portable`): Timestamp → дата (RFC 3339, UTC, миллисекунды, суффикс `Z`)
//! либо typed envelope `{"$type":"timestamp","value":"..."}`; остальное копируется структурно.
//!
//! Import (`from_portable`):
//! - envelope распознаётся только при `encoding == Envelope` (снапшот так и записан,
//!   см. `timestamp_encoding` в manifest.json); иначе это обычная карта;
//! - лексическая эвристика (строка начинается с '2' и заканчивается на 'Z') включается
//!   флагом `lexical_dates`. Если разбор не удался: строка остаётся строкой.
//!
//! Эвристика намеренно не «чинится»: строки вида "2...Z", не задуманные как даты,
//! при restore станут Timestamp (известный lossy-случай). См. `parse_date_like`.
//!
//! Обе функции тотальны: любой JSON даёт результат, ошибок нет.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};

use crate::value::{Document, Fields, StoreValue};

pub const ENVELOPE_TYPE_KEY: &str = "$type";
pub const ENVELOPE_VALUE_KEY: &str = "value";
pub const ENVELOPE_TIMESTAMP: &str = "timestamp";

/// How timestamps are written into portable JSON.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TimestampEncoding {
    /// Plain RFC 3339 string (`2021-08-04T09:45:42.000Z`), readable by older snapshots.
    #[default]
    IsoString,
    /// `{"$type":"timestamp","value":"<rfc3339>"}`
    Envelope,
}

impl TimestampEncoding {
    /// Имя в manifest.json.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimestampEncoding::IsoString => "iso",
            TimestampEncoding::Envelope => "envelope",
        }
    }

    pub fn from_manifest(name: &str) -> Option<Self> {
        match name {
            "iso" => Some(TimestampEncoding::IsoString),
            "envelope" => Some(TimestampEncoding::Envelope),
            _ => None,
        }
    }
}

/// Converter passed explicitly to every store-access pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Converter {
    pub encoding: TimestampEncoding,
    /// Promote date-like strings back to timestamps on import.
    pub lexical_dates: bool,
}

impl Default for Converter {
    fn default() -> Self {
        Self {
            encoding: TimestampEncoding::IsoString,
            lexical_dates: true,
        }
    }
}

impl Converter {
    pub fn new(encoding: TimestampEncoding, lexical_dates: bool) -> Self {
        Self {
            encoding,
            lexical_dates,
        }
    }

    /// Converter that never touches strings on import (raw JSON → store).
    pub fn raw() -> Self {
        Self {
            encoding: TimestampEncoding::IsoString,
            lexical_dates: false,
        }
    }

    pub fn with_encoding(mut self, encoding: TimestampEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_lexical_dates(mut self, on: bool) -> Self {
        self.lexical_dates = on;
        self
    }

    // ---------------- export ----------------

    pub fn to_portable(&self, doc: &Document) -> Map<String, Value> {
        let mut out = Map::with_capacity(doc.len());
        for (k, v) in doc {
            out.insert(k.clone(), self.value_to_portable(v));
        }
        out
    }

    pub fn value_to_portable(&self, v: &StoreValue) -> Value {
        match v {
            StoreValue::Null => Value::Null,
            StoreValue::Bool(b) => Value::Bool(*b),
            StoreValue::Integer(i) => Value::Number(Number::from(*i)),
            // NaN/Inf в JSON непредставимы: как JSON.stringify, пишем null.
            StoreValue::Double(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            StoreValue::String(s) => Value::String(s.clone()),
            StoreValue::Timestamp(ts) => match self.encoding {
                TimestampEncoding::IsoString => Value::String(format_timestamp(ts)),
                TimestampEncoding::Envelope => {
                    let mut env = Map::with_capacity(2);
                    env.insert(
                        ENVELOPE_TYPE_KEY.to_string(),
                        Value::String(ENVELOPE_TIMESTAMP.to_string()),
                    );
                    env.insert(
                        ENVELOPE_VALUE_KEY.to_string(),
                        Value::String(format_timestamp(ts)),
                    );
                    Value::Object(env)
                }
            },
            StoreValue::Array(items) => {
                Value::Array(items.iter().map(|i| self.value_to_portable(i)).collect())
            }
            StoreValue::Map(fields) => Value::Object(self.to_portable(fields)),
        }
    }

    // ---------------- import ----------------

    pub fn from_portable(&self, doc: &Map<String, Value>) -> Document {
        let mut out = Fields::with_capacity(doc.len());
        for (k, v) in doc {
            out.insert(k.clone(), self.value_from_portable(v));
        }
        out
    }

    pub fn value_from_portable(&self, v: &Value) -> StoreValue {
        match v {
            Value::Null => StoreValue::Null,
            Value::Bool(b) => StoreValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => StoreValue::Integer(i),
                None => StoreValue::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => {
                if self.lexical_dates {
                    if let Some(ts) = parse_date_like(s) {
                        return StoreValue::Timestamp(ts);
                    }
                }
                StoreValue::String(s.clone())
            }
            Value::Array(items) => {
                StoreValue::Array(items.iter().map(|i| self.value_from_portable(i)).collect())
            }
            Value::Object(map) => {
                if self.encoding == TimestampEncoding::Envelope {
                    if let Some(ts) = parse_envelope(map) {
                        return StoreValue::Timestamp(ts);
                    }
                }
                StoreValue::Map(self.from_portable(map))
            }
        }
    }
}

/// Timestamp → `YYYY-MM-DDTHH:MM:SS.mmmZ` (точность: миллисекунды).
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Лексическая эвристика импорта: `starts_with('2') && ends_with('Z')`, затем RFC 3339.
///
/// Правило намеренно узкое и хрупкое; менять только вместе с тестами ниже.
pub fn parse_date_like(s: &str) -> Option<DateTime<Utc>> {
    if !(s.starts_with('2') && s.ends_with('Z')) {
        return None;
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_envelope(map: &Map<String, Value>) -> Option<DateTime<Utc>> {
    if map.len() != 2 {
        return None;
    }
    match (map.get(ENVELOPE_TYPE_KEY), map.get(ENVELOPE_VALUE_KEY)) {
        (Some(Value::String(t)), Some(Value::String(v))) if t == ENVELOPE_TIMESTAMP => {
            DateTime::parse_from_rfc3339(v)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn joined() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 8, 4, 9, 45, 42).unwrap()
    }

    fn as_object(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn date_like_pattern_is_pinned() {
        assert_eq!(parse_date_like("2021-08-04T09:45:42.000Z"), Some(joined()));
        assert_eq!(parse_date_like("2021-08-04T09:45:42Z"), Some(joined()));
        // не начинается с '2'
        assert_eq!(parse_date_like("1999-01-01T00:00:00Z"), None);
        // нет суффикса Z
        assert_eq!(parse_date_like("2021-08-04T09:45:42+00:00"), None);
        // подходит по шаблону, но не дата: остаётся строкой
        assert_eq!(parse_date_like("2 pizzas for Z"), None);
        assert_eq!(parse_date_like(""), None);
    }

    #[test]
    fn timestamps_export_as_iso_strings() {
        let mut doc = Document::new();
        doc.insert("name".into(), "Alice".into());
        doc.insert("joined".into(), StoreValue::Timestamp(joined()));
        let mut nested = Fields::new();
        nested.insert("at".into(), StoreValue::Timestamp(joined()));
        doc.insert(
            "history".into(),
            StoreValue::Array(vec![StoreValue::Map(nested), StoreValue::Integer(3)]),
        );

        let out = Converter::default().to_portable(&doc);
        assert_eq!(
            Value::Object(out),
            json!({
                "name": "Alice",
                "joined": "2021-08-04T09:45:42.000Z",
                "history": [{"at": "2021-08-04T09:45:42.000Z"}, 3]
            })
        );
    }

    #[test]
    fn lexical_import_promotes_and_passes_through() {
        let cvt = Converter::default();
        let doc = cvt.from_portable(&as_object(json!({
            "joined": "2021-08-04T09:45:42.000Z",
            "code": "2XZ",
            "plain": "hello",
            "list": ["2021-08-04T09:45:42Z", 1.5, null],
            "deep": {"at": "2021-08-04T09:45:42Z"}
        })));
        assert_eq!(doc["joined"], StoreValue::Timestamp(joined()));
        assert_eq!(doc["code"], StoreValue::from("2XZ"));
        assert_eq!(doc["plain"], StoreValue::from("hello"));
        assert_eq!(
            doc["list"],
            StoreValue::Array(vec![
                StoreValue::Timestamp(joined()),
                StoreValue::Double(1.5),
                StoreValue::Null
            ])
        );
        let deep = doc["deep"].as_map().unwrap();
        assert_eq!(deep["at"], StoreValue::Timestamp(joined()));
    }

    #[test]
    fn raw_converter_keeps_strings() {
        let doc = Converter::raw().from_portable(&as_object(json!({"at": "2021-08-04T09:45:42Z"})));
        assert_eq!(doc["at"], StoreValue::from("2021-08-04T09:45:42Z"));
    }

    #[test]
    fn envelope_roundtrip_without_heuristic() {
        let cvt = Converter::new(TimestampEncoding::Envelope, false);
        let mut doc = Document::new();
        doc.insert("joined".into(), StoreValue::Timestamp(joined()));
        doc.insert("label".into(), "2021-08-04T09:45:42Z".into());

        let portable = cvt.to_portable(&doc);
        assert_eq!(
            portable["joined"],
            json!({"$type": "timestamp", "value": "2021-08-04T09:45:42.000Z"})
        );
        let back = cvt.from_portable(&portable);
        assert_eq!(back, doc);
    }

    #[test]
    fn envelope_with_extra_keys_is_a_plain_map() {
        let cvt = Converter::new(TimestampEncoding::Envelope, false);
        let doc = cvt.from_portable(&as_object(json!({
            "x": {"$type": "timestamp", "value": "2021-08-04T09:45:42Z", "extra": 1}
        })));
        assert_eq!(doc["x"].type_name(), "map");
    }

    #[test]
    fn envelope_shape_is_a_map_under_iso_encoding() {
        let doc = Converter::default().from_portable(&as_object(json!({
            "meta": {"$type": "timestamp", "value": "2021-08-04T09:45:42Z"}
        })));
        assert_eq!(doc["meta"].type_name(), "map");
        assert_eq!(
            Converter::raw().from_portable(&as_object(json!({"m": {"$type": "timestamp", "value": "2021-08-04T09:45:42Z"}})))["m"].type_name(),
            "map"
        );
    }

    #[test]
    fn encoding_names_match_manifest() {
        for e in [TimestampEncoding::IsoString, TimestampEncoding::Envelope] {
            assert_eq!(TimestampEncoding::from_manifest(e.as_str()), Some(e));
        }
        assert_eq!(TimestampEncoding::from_manifest("bson"), None);
    }

    #[test]
    fn integers_and_doubles_keep_their_kind() {
        let cvt = Converter::default();
        let doc = cvt.from_portable(&as_object(json!({"i": 7, "f": 7.25, "big": 18446744073709551615u64})));
        assert_eq!(doc["i"], StoreValue::Integer(7));
        assert_eq!(doc["f"], StoreValue::Double(7.25));
        assert_eq!(doc["big"].type_name(), "double");
        assert_eq!(Value::Object(cvt.to_portable(&doc))["i"], json!(7));
    }
}
