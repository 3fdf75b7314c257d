//! MemoryStore: in-process бэкенд стора.
//!
//! Используется тестами как дубль настоящего стора:
//! - считает коммиты и размер каждого батча (commit_sizes);
//! - умеет «ронять» N-й коммит (fail_commit_at) и записи по конкретным путям (fail_writes_for);
//! - отслеживает максимум одновременных одиночных записей (max_in_flight) при заданной
//!   задержке записи (with_write_delay): так проверяется write gate.

use anyhow::{anyhow, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use super::state::StoreState;
use super::{
    validate_doc_path, DocSnapshot, DocumentStore, SetOptions, Transaction, TxnFn, WriteBatch,
};
use crate::util::{lock, read, write};
use crate::value::Document;

#[derive(Default)]
struct Faults {
    fail_commit_at: Option<usize>,
    fail_paths: HashSet<String>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
    commit_sizes: Mutex<Vec<usize>>,
    commit_attempts: AtomicUsize,
    single_writes: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    write_delay: Option<Duration>,
    faults: Mutex<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Искусственная задержка одиночной записи (set вне батча).
    pub fn with_write_delay(mut self, d: Duration) -> Self {
        self.write_delay = Some(d);
        self
    }

    /// N-я (1-based) попытка коммита вернёт ошибку и ничего не применит.
    pub fn fail_commit_at(&self, n: usize) {
        if let Ok(mut f) = lock(&self.faults) {
            f.fail_commit_at = Some(n);
        }
    }

    /// Одиночные записи по этому пути будут падать.
    pub fn fail_writes_for(&self, path: &str) {
        if let Ok(mut f) = lock(&self.faults) {
            f.fail_paths.insert(path.to_string());
        }
    }

    /// Размеры успешно закоммиченных батчей (по порядку).
    pub fn commit_sizes(&self) -> Vec<usize> {
        lock(&self.commit_sizes).map(|v| v.clone()).unwrap_or_default()
    }

    pub fn commit_count(&self) -> usize {
        self.commit_sizes().len()
    }

    pub fn single_write_count(&self) -> usize {
        self.single_writes.load(Ordering::Relaxed)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::Relaxed)
    }

    pub fn doc_count(&self) -> usize {
        read(&self.state).map(|s| s.len()).unwrap_or(0)
    }

    /// Прямая запись в состояние (заполнение фикстур, без счётчиков).
    pub fn insert(&self, path: &str, data: Document) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.set(path, data);
        batch.validate()?;
        write(&self.state)?.apply(batch, Utc::now());
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn list_collections(&self) -> Result<Vec<String>> {
        Ok(read(&self.state)?.list_collections())
    }

    fn list_documents(&self, collection: &str) -> Result<Vec<String>> {
        read(&self.state)?.list_documents(collection)
    }

    fn get_all(&self, paths: &[String]) -> Result<Vec<DocSnapshot>> {
        for p in paths {
            validate_doc_path(p)?;
        }
        let st = read(&self.state)?;
        Ok(paths.iter().map(|p| st.snapshot_of(p)).collect())
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        batch.validate()?;
        let attempt = self.commit_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if lock(&self.faults)?.fail_commit_at == Some(attempt) {
            return Err(anyhow!("injected commit failure (attempt {})", attempt));
        }
        let n = batch.len();
        write(&self.state)?.apply(batch, Utc::now());
        lock(&self.commit_sizes)?.push(n);
        Ok(())
    }

    fn run_transaction(&self, f: &mut TxnFn<'_>) -> Result<()> {
        let mut st = write(&self.state)?;
        let writes = {
            let mut txn = Transaction::new(&*st);
            f(&mut txn)?;
            txn.into_writes()
        };
        writes.validate()?;
        st.apply(writes, Utc::now());
        Ok(())
    }

    fn set(&self, path: &str, data: Document, opts: SetOptions) -> Result<()> {
        validate_doc_path(path)?;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(d) = self.write_delay {
            std::thread::sleep(d);
        }

        let res = (|| -> Result<()> {
            if lock(&self.faults)?.fail_paths.contains(path) {
                return Err(anyhow!("injected write failure for '{}'", path));
            }
            let mut batch = WriteBatch::new();
            batch.set_with(path, data, opts);
            write(&self.state)?.apply(batch, Utc::now());
            self.single_writes.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })();

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        res
    }
}
