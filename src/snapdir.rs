//! snapdir: on-disk форма снапшота (SnapshotDirectory).
//!
//! Раскладка:
//!   <data_dir>/<YYYY_MM_DD HH_mm_ss>[ - <label>]/
//!       manifest.json                 : сводка + CRC32 canonical-файлов
//!       <collection>/<doc_id>.json    : canonical JSON (порядок полей как в сторе)
//!       <collection>/_<doc_id>.sorted.json: ключи отсортированы, pretty (для diff между выгрузками)
//!
//! Restore читает только подпапки-коллекции и только `*.json`, имена которых не
//! начинаются с `_` (и не скрытые). Имя документа = имя файла без `.json` и без
//! числового префикса `NN.` (`02.foo.json` → `foo`).

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::converter::{Converter, TimestampEncoding};
use crate::metrics::{
    record_snapshot_file_loaded, record_snapshot_file_skipped, record_snapshot_file_written,
};
use crate::snapshot::Snapshot;
use crate::value::Document;

pub const SNAPSHOT_DIR_FORMAT: &str = "%Y_%m_%d %H_%M_%S";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const DOC_EXT: &str = "json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub created_at: DateTime<Utc>,
    pub label: Option<String>,
    pub timestamp_encoding: String,
    /// collection → число документов
    pub collections: BTreeMap<String, usize>,
    pub documents: usize,
    /// "<collection>/<doc_id>.json" → CRC32 canonical-файла
    pub files: BTreeMap<String, u32>,
}

/// Имя папки снапшота: `YYYY_MM_DD HH_mm_ss[ - label]`.
pub fn snapshot_dir_name(at: &NaiveDateTime, label: Option<&str>) -> String {
    let stamp = at.format(SNAPSHOT_DIR_FORMAT).to_string();
    match label.map(str::trim).filter(|l| !l.is_empty()) {
        Some(l) => format!("{} - {}", stamp, l),
        None => stamp,
    }
}

/// Под каким ID документ вернётся при restore; None: файл будет пропущен.
pub fn restored_doc_id(doc_id: &str) -> Option<&str> {
    if doc_id.starts_with('_') {
        return None;
    }
    Some(clean_doc_name(doc_id))
}

/// `02.foo` → `foo`; без числового префикса имя не меняется.
pub fn clean_doc_name(stem: &str) -> &str {
    match stem.split_once('.') {
        Some((prefix, rest))
            if !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit()) =>
        {
            rest
        }
        _ => stem,
    }
}

/// Рекурсивная сортировка ключей; массивы сохраняют порядок.
pub fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::with_capacity(map.len());
            for k in keys {
                out.insert(k.clone(), sort_keys(&map[k]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

fn is_visible(name: &str) -> bool {
    !name.starts_with('.')
}

/// Подпапки `dir` (без скрытых), отсортированные по имени.
pub fn scan_folders(dir: &Path) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let rd = fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))?;
    for entry in rd {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if is_visible(name) {
                out.push(name.to_string());
            }
        }
    }
    out.sort();
    Ok(out)
}

/// Файлы `*.<ext>` в `dir` (без скрытых), отсортированные по имени.
pub fn scan_files(dir: &Path, ext: &str) -> Result<Vec<String>> {
    if ext.is_empty() {
        return Err(anyhow!("extension is required"));
    }
    let suffix = format!(".{}", ext);
    let mut out = Vec::new();
    let rd = fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))?;
    for entry in rd {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if is_visible(name) && name.ends_with(&suffix) && name.len() > suffix.len() {
                out.push(name.to_string());
            }
        }
    }
    out.sort();
    Ok(out)
}

/// Доступные снапшоты в рабочей папке.
pub fn list_snapshots(data_dir: &Path) -> Result<Vec<String>> {
    if !data_dir.exists() {
        return Ok(Vec::new());
    }
    scan_folders(data_dir)
}

/// Прочитать JSON-объект документа из файла и перевести в store-форму.
pub fn read_doc_file(path: &Path, converter: &Converter) -> Result<Document> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let v: Value =
        serde_json::from_str(&raw).with_context(|| format!("parse JSON {}", path.display()))?;
    match v {
        Value::Object(map) => Ok(converter.from_portable(&map)),
        other => Err(anyhow!(
            "{}: document must be a JSON object, got {}",
            path.display(),
            json_kind(&other)
        )),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("write {}", path.display()))?;
    record_snapshot_file_written();
    Ok(())
}

/// Записать снапшот в `dir` (создаётся). Возвращает записанный manifest.
pub fn write_snapshot_dir(
    dir: &Path,
    snapshot: &Snapshot,
    converter: &Converter,
    label: Option<&str>,
) -> Result<SnapshotManifest> {
    fs::create_dir_all(dir).with_context(|| format!("create snapshot dir {}", dir.display()))?;

    let mut manifest = SnapshotManifest {
        created_at: Utc::now(),
        label: label.map(str::to_string),
        timestamp_encoding: converter.encoding.as_str().to_string(),
        collections: BTreeMap::new(),
        documents: 0,
        files: BTreeMap::new(),
    };

    for (collection, docs) in snapshot.collections() {
        let col_dir = dir.join(collection);
        fs::create_dir_all(&col_dir)
            .with_context(|| format!("create collection dir {}", col_dir.display()))?;

        for (doc_id, doc) in docs {
            match restored_doc_id(doc_id) {
                None => warn!(
                    "{}/{}: id starts with '_', restore will skip this document",
                    collection, doc_id
                ),
                Some(back) if back != doc_id => warn!(
                    "{}/{}: numeric prefix, restore will write it as '{}'",
                    collection, doc_id, back
                ),
                Some(_) => {}
            }
            let portable = Value::Object(converter.to_portable(doc));

            let mut canonical = serde_json::to_vec(&portable)
                .with_context(|| format!("serialize {}/{}", collection, doc_id))?;
            canonical.push(b'\n');
            let mut sorted = serde_json::to_vec_pretty(&sort_keys(&portable))
                .with_context(|| format!("serialize sorted {}/{}", collection, doc_id))?;
            sorted.push(b'\n');

            let file_name = format!("{}.{}", doc_id, DOC_EXT);
            write_bytes(&col_dir.join(&file_name), &canonical)?;
            write_bytes(&col_dir.join(format!("_{}.sorted.{}", doc_id, DOC_EXT)), &sorted)?;

            manifest
                .files
                .insert(format!("{}/{}", collection, file_name), crc32fast::hash(&canonical));
        }
        manifest.collections.insert(collection.clone(), docs.len());
        manifest.documents += docs.len();
    }

    let manifest_path = dir.join(MANIFEST_FILE);
    let bytes = serde_json::to_vec_pretty(&manifest).context("serialize manifest")?;
    fs::write(&manifest_path, bytes)
        .with_context(|| format!("write {}", manifest_path.display()))?;

    info!(
        "snapshot written: {} ({} collection(s), {} document(s))",
        dir.display(),
        manifest.collections.len(),
        manifest.documents
    );
    Ok(manifest)
}

/// Загрузить снапшот из папки. Пустые папки-коллекции попадают в снапшот как пустые.
pub fn load_snapshot_dir(dir: &Path, converter: &Converter) -> Result<Snapshot> {
    let mut snapshot = Snapshot::new();
    for collection in scan_folders(dir)? {
        let col_dir = dir.join(&collection);
        let entry = snapshot.ensure_collection(&collection);

        for file in scan_files(&col_dir, DOC_EXT)? {
            let stem = &file[..file.len() - DOC_EXT.len() - 1];
            let Some(doc_id) = restored_doc_id(stem).map(str::to_string) else {
                record_snapshot_file_skipped();
                continue;
            };
            let path = col_dir.join(&file);
            let doc = read_doc_file(&path, converter)?;
            record_snapshot_file_loaded();
            debug!("loaded {}/{} from {}", collection, doc_id, file);

            if entry.insert(doc_id.clone(), doc).is_some() {
                warn!(
                    "{}: duplicate document id '{}' after prefix cleanup, later file wins",
                    col_dir.display(),
                    doc_id
                );
            }
        }
    }
    Ok(snapshot)
}

pub fn read_manifest(dir: &Path) -> Result<Option<SnapshotManifest>> {
    let path = dir.join(MANIFEST_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
    let m = serde_json::from_slice(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(m))
}

/// `base` с кодировкой timestamp'ов из manifest.json (если он есть и она известна).
pub fn snapshot_converter(dir: &Path, base: &Converter) -> Result<Converter> {
    let Some(m) = read_manifest(dir)? else {
        return Ok(*base);
    };
    match TimestampEncoding::from_manifest(&m.timestamp_encoding) {
        Some(enc) => {
            if enc != base.encoding {
                debug!("{}: timestamp encoding '{}' from manifest", dir.display(), enc.as_str());
            }
            Ok(base.with_encoding(enc))
        }
        None => {
            warn!(
                "{}: unknown timestamp encoding '{}' in manifest, using '{}'",
                dir.display(),
                m.timestamp_encoding,
                base.encoding.as_str()
            );
            Ok(*base)
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub manifest_present: bool,
    pub checked: usize,
    pub problems: Vec<String>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Сверить canonical-файлы с CRC из manifest.json.
pub fn verify_snapshot_dir(dir: &Path) -> Result<VerifyReport> {
    let Some(manifest) = read_manifest(dir)? else {
        warn!("{}: no {}, skipping verification", dir.display(), MANIFEST_FILE);
        return Ok(VerifyReport::default());
    };
    let mut report = VerifyReport {
        manifest_present: true,
        ..Default::default()
    };
    for (rel, expected) in &manifest.files {
        let path: PathBuf = dir.join(rel);
        report.checked += 1;
        match fs::read(&path) {
            Ok(bytes) => {
                let got = crc32fast::hash(&bytes);
                if got != *expected {
                    report.problems.push(format!(
                        "{}: crc mismatch (expected {:08x}, got {:08x})",
                        rel, expected, got
                    ));
                }
            }
            Err(e) => report.problems.push(format!("{}: {}", rel, e)),
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn dir_name_format() {
        let at = NaiveDate::from_ymd_opt(2021, 8, 4)
            .unwrap()
            .and_hms_opt(9, 45, 42)
            .unwrap();
        assert_eq!(snapshot_dir_name(&at, None), "2021_08_04 09_45_42");
        assert_eq!(
            snapshot_dir_name(&at, Some("case 1")),
            "2021_08_04 09_45_42 - case 1"
        );
        assert_eq!(snapshot_dir_name(&at, Some("  ")), "2021_08_04 09_45_42");
    }

    #[test]
    fn numeric_prefix_is_stripped() {
        assert_eq!(clean_doc_name("02.foo"), "foo");
        assert_eq!(clean_doc_name("1"), "1");
        assert_eq!(clean_doc_name("foo.bar"), "foo.bar");
        assert_eq!(clean_doc_name("12.3.x"), "3.x");
        assert_eq!(clean_doc_name(".x"), ".x");
    }

    #[test]
    fn restored_id_of_awkward_ids() {
        assert_eq!(restored_doc_id("alice"), Some("alice"));
        assert_eq!(restored_doc_id("_draft"), None);
        assert_eq!(restored_doc_id("07.week"), Some("week"));
    }

    #[test]
    fn sort_keys_recurses_and_keeps_array_order() {
        let v = json!({"b": 1, "a": [{"z": 1, "y": 2}, 3], "c": {"k": 1, "j": 2}});
        let sorted = sort_keys(&v);
        let text = serde_json::to_string(&sorted).unwrap();
        assert_eq!(text, r#"{"a":[{"y":2,"z":1},3],"b":1,"c":{"j":2,"k":1}}"#);
    }
}
