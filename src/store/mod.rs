//! store: контракт документного стора (внешний коллаборатор) и бэкенды.
//!
//! Ядро зависит только от:
//! - list_collections / list_documents (перечисление без чтения тел);
//! - get_all (bulk get);
//! - commit(WriteBatch): атомарный батч, не более MAX_BATCH_OPS операций;
//! - run_transaction: транзакционные set/update одного документа.
//!
//! Бэкенды:
//! - memory::MemoryStore: in-process, для тестов (счётчики коммитов, инъекция ошибок);
//! - local::LocalStore : локальный эмулятор: один JSON-файл под fs2-локом.

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};

use crate::value::Document;

pub mod local;
pub mod memory;
pub mod state;

pub use local::LocalStore;
pub use memory::MemoryStore;

/// Лимит операций в одном атомарном батче (ограничение бэкенда).
pub const MAX_BATCH_OPS: usize = 500;

// ---------------- paths ----------------

/// Разбить путь на сегменты; пустые сегменты запрещены.
pub fn path_segments(path: &str) -> Result<Vec<&str>> {
    if path.is_empty() {
        bail!("empty path");
    }
    let segs: Vec<&str> = path.split('/').collect();
    if segs.iter().any(|s| s.is_empty()) {
        bail!("invalid path '{}': empty segment", path);
    }
    Ok(segs)
}

/// Документ: чётное число сегментов (`col/doc`, `col/doc/sub/doc`, ...).
pub fn validate_doc_path(path: &str) -> Result<()> {
    let segs = path_segments(path)?;
    if segs.len() % 2 != 0 {
        bail!(
            "invalid document path '{}': must be in format <collection>/<doc-id>",
            path
        );
    }
    Ok(())
}

/// Коллекция: нечётное число сегментов (`col`, `col/doc/sub`, ...).
pub fn validate_collection_path(path: &str) -> Result<()> {
    let segs = path_segments(path)?;
    if segs.len() % 2 == 0 {
        bail!("invalid collection path '{}'", path);
    }
    Ok(())
}

pub fn doc_id(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, id)| id).unwrap_or(path)
}

pub fn parent_collection(path: &str) -> &str {
    path.rsplit_once('/').map(|(p, _)| p).unwrap_or("")
}

pub fn join_path(collection: &str, id: &str) -> String {
    format!("{}/{}", collection, id)
}

/// Аргумент `doc`: полный путь либо голый ID, который достраивается коллекцией.
pub fn resolve_doc_arg(arg: &str, collection: Option<&str>) -> Result<String> {
    let arg = arg.trim();
    let path = match collection.map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) if !arg.contains('/') => join_path(c, arg),
        _ => arg.to_string(),
    };
    validate_doc_path(&path)?;
    Ok(path)
}

// ---------------- read side ----------------

/// Результат чтения одного документа.
#[derive(Clone, Debug, PartialEq)]
pub struct DocSnapshot {
    pub path: String,
    pub data: Option<Document>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl DocSnapshot {
    pub fn missing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            data: None,
            create_time: None,
            update_time: None,
        }
    }

    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    pub fn id(&self) -> &str {
        doc_id(&self.path)
    }
}

// ---------------- write side ----------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// false: полная замена документа; true: deep merge в существующий.
    pub merge: bool,
}

impl SetOptions {
    pub fn replace() -> Self {
        Self { merge: false }
    }

    pub fn merge() -> Self {
        Self { merge: true }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum WriteOp {
    Set {
        path: String,
        data: Document,
        opts: SetOptions,
    },
    Delete {
        path: String,
    },
}

impl WriteOp {
    pub fn path(&self) -> &str {
        match self {
            WriteOp::Set { path, .. } | WriteOp::Delete { path } => path,
        }
    }
}

/// Атомарный батч записей. Коммитится целиком через `DocumentStore::commit`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert (full replace).
    pub fn set(&mut self, path: impl Into<String>, data: Document) -> &mut Self {
        self.set_with(path, data, SetOptions::replace())
    }

    pub fn set_with(
        &mut self,
        path: impl Into<String>,
        data: Document,
        opts: SetOptions,
    ) -> &mut Self {
        self.ops.push(WriteOp::Set {
            path: path.into(),
            data,
            opts,
        });
        self
    }

    pub fn delete(&mut self, path: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::Delete { path: path.into() });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    /// Проверка перед коммитом: размер и пути всех операций.
    pub fn validate(&self) -> Result<()> {
        if self.ops.len() > MAX_BATCH_OPS {
            return Err(anyhow!(
                "batch has {} operations, limit is {}",
                self.ops.len(),
                MAX_BATCH_OPS
            ));
        }
        for op in &self.ops {
            validate_doc_path(op.path())?;
        }
        Ok(())
    }
}

// ---------------- transactions ----------------

/// Чтение внутри транзакции (реализуется состоянием бэкенда под локом).
pub trait DocReader {
    fn read(&self, path: &str) -> Result<DocSnapshot>;
}

/// Транзакция: чтения из зафиксированного состояния + буфер записей,
/// которые бэкенд применяет атомарно после успешного завершения closure.
pub struct Transaction<'a> {
    reader: &'a dyn DocReader,
    writes: WriteBatch,
}

impl<'a> Transaction<'a> {
    pub fn new(reader: &'a dyn DocReader) -> Self {
        Self {
            reader,
            writes: WriteBatch::new(),
        }
    }

    pub fn get(&self, path: &str) -> Result<DocSnapshot> {
        validate_doc_path(path)?;
        self.reader.read(path)
    }

    pub fn set(&mut self, path: &str, data: Document, opts: SetOptions) -> Result<()> {
        validate_doc_path(path)?;
        self.writes.set_with(path, data, opts);
        Ok(())
    }

    pub fn delete(&mut self, path: &str) -> Result<()> {
        validate_doc_path(path)?;
        self.writes.delete(path);
        Ok(())
    }

    pub fn into_writes(self) -> WriteBatch {
        self.writes
    }
}

pub type TxnFn<'f> = dyn FnMut(&mut Transaction<'_>) -> Result<()> + 'f;

// ---------------- the contract ----------------

pub trait DocumentStore: Send + Sync {
    /// Короткое описание бэкенда для doctor/логов.
    fn describe(&self) -> String;

    /// Имена top-level коллекций (отсортированы).
    fn list_collections(&self) -> Result<Vec<String>>;

    /// ID документов коллекции; тела не читаются.
    fn list_documents(&self, collection: &str) -> Result<Vec<String>>;

    /// Bulk get; порядок результатов совпадает с порядком `paths`.
    fn get_all(&self, paths: &[String]) -> Result<Vec<DocSnapshot>>;

    /// Атомарный коммит батча (все операции или ни одной).
    fn commit(&self, batch: WriteBatch) -> Result<()>;

    fn run_transaction(&self, f: &mut TxnFn<'_>) -> Result<()>;

    fn get(&self, path: &str) -> Result<DocSnapshot> {
        validate_doc_path(path)?;
        self.get_all(&[path.to_string()])?
            .pop()
            .ok_or_else(|| anyhow!("store returned no snapshot for '{}'", path))
    }

    /// Одиночная запись документа.
    fn set(&self, path: &str, data: Document, opts: SetOptions) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.set_with(path, data, opts);
        self.commit(batch)
    }

    fn delete(&self, path: &str) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(path);
        self.commit(batch)
    }
}
