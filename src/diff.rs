//! diff: пополевой diff двух версий документа (update preview, doc --watch).
//!
//! Вложенные карты сравниваются рекурсивно, путь поля: через точку (`address.city`).
//! Массивы и скаляры сравниваются целиком.

use serde_json::Value;

use crate::converter::Converter;
use crate::value::{Document, Fields, StoreValue};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldChange {
    pub path: String,
    pub kind: ChangeKind,
    pub old: Option<StoreValue>,
    pub new: Option<StoreValue>,
}

impl FieldChange {
    /// Одна строка для консоли: `+ a.b: 1`, `- a.b: 1`, `~ a.b: 1 -> 2`.
    pub fn describe(&self, converter: &Converter) -> String {
        let show = |v: &Option<StoreValue>| -> String {
            v.as_ref()
                .map(|v| compact(&converter.value_to_portable(v)))
                .unwrap_or_default()
        };
        match self.kind {
            ChangeKind::Added => format!("+ {}: {}", self.path, show(&self.new)),
            ChangeKind::Removed => format!("- {}: {}", self.path, show(&self.old)),
            ChangeKind::Modified => format!(
                "~ {}: {} -> {}",
                self.path,
                show(&self.old),
                show(&self.new)
            ),
        }
    }
}

fn compact(v: &Value) -> String {
    serde_json::to_string(v).unwrap_or_else(|_| "<unprintable>".to_string())
}

/// Отсутствующий документ трактуется как пустой.
pub fn diff_documents(old: Option<&Document>, new: Option<&Document>) -> Vec<FieldChange> {
    let empty = Fields::new();
    let mut out = Vec::new();
    diff_fields("", old.unwrap_or(&empty), new.unwrap_or(&empty), &mut out);
    out
}

fn field_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn diff_fields(prefix: &str, old: &Fields, new: &Fields, out: &mut Vec<FieldChange>) {
    for (key, old_v) in old {
        let path = field_path(prefix, key);
        match new.get(key) {
            None => out.push(FieldChange {
                path,
                kind: ChangeKind::Removed,
                old: Some(old_v.clone()),
                new: None,
            }),
            Some(new_v) => match (old_v, new_v) {
                (StoreValue::Map(a), StoreValue::Map(b)) => diff_fields(&path, a, b, out),
                (a, b) if a != b => out.push(FieldChange {
                    path,
                    kind: ChangeKind::Modified,
                    old: Some(a.clone()),
                    new: Some(b.clone()),
                }),
                _ => {}
            },
        }
    }
    for (key, new_v) in new {
        if !old.contains_key(key) {
            out.push(FieldChange {
                path: field_path(prefix, key),
                kind: ChangeKind::Added,
                old: None,
                new: Some(new_v.clone()),
            });
        }
    }
}
