//! Lightweight global metrics.
//!
//! Потокобезопасные атомарные счётчики для конвейеров dump/restore/update:
//! - чтения документов (tree/full dump, doc);
//! - батч-коммиты и записанные документы;
//! - одиночные записи через write gate и их ошибки;
//! - файлы снапшота (записано / загружено / пропущено).

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

// ----- Reads -----
static DOCS_READ: AtomicU64 = AtomicU64::new(0);

// ----- Writes -----
static BATCHES_COMMITTED: AtomicU64 = AtomicU64::new(0);
static DOCS_WRITTEN: AtomicU64 = AtomicU64::new(0);
static SINGLE_WRITES_ISSUED: AtomicU64 = AtomicU64::new(0);
static WRITE_FAILURES: AtomicU64 = AtomicU64::new(0);
static DOCS_DELETED: AtomicU64 = AtomicU64::new(0);

// ----- Snapshot files -----
static SNAPSHOT_FILES_WRITTEN: AtomicU64 = AtomicU64::new(0);
static SNAPSHOT_FILES_LOADED: AtomicU64 = AtomicU64::new(0);
static SNAPSHOT_FILES_SKIPPED: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub docs_read: u64,
    pub batches_committed: u64,
    pub docs_written: u64,
    pub single_writes_issued: u64,
    pub write_failures: u64,
    pub docs_deleted: u64,
    pub snapshot_files_written: u64,
    pub snapshot_files_loaded: u64,
    pub snapshot_files_skipped: u64,
}

impl MetricsSnapshot {
    /// Средний размер закоммиченного батча.
    pub fn avg_batch_docs(&self) -> f64 {
        if self.batches_committed == 0 {
            0.0
        } else {
            self.docs_written as f64 / self.batches_committed as f64
        }
    }
}

pub fn record_docs_read(n: usize) {
    DOCS_READ.fetch_add(n as u64, Ordering::Relaxed);
}

pub fn record_batch_committed(docs: usize) {
    BATCHES_COMMITTED.fetch_add(1, Ordering::Relaxed);
    DOCS_WRITTEN.fetch_add(docs as u64, Ordering::Relaxed);
}

pub fn record_single_write(ok: bool) {
    SINGLE_WRITES_ISSUED.fetch_add(1, Ordering::Relaxed);
    if ok {
        DOCS_WRITTEN.fetch_add(1, Ordering::Relaxed);
    } else {
        WRITE_FAILURES.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn record_docs_deleted(n: usize) {
    DOCS_DELETED.fetch_add(n as u64, Ordering::Relaxed);
}

pub fn record_snapshot_file_written() {
    SNAPSHOT_FILES_WRITTEN.fetch_add(1, Ordering::Relaxed);
}

pub fn record_snapshot_file_loaded() {
    SNAPSHOT_FILES_LOADED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_snapshot_file_skipped() {
    SNAPSHOT_FILES_SKIPPED.fetch_add(1, Ordering::Relaxed);
}

pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        docs_read: DOCS_READ.load(Ordering::Relaxed),
        batches_committed: BATCHES_COMMITTED.load(Ordering::Relaxed),
        docs_written: DOCS_WRITTEN.load(Ordering::Relaxed),
        single_writes_issued: SINGLE_WRITES_ISSUED.load(Ordering::Relaxed),
        write_failures: WRITE_FAILURES.load(Ordering::Relaxed),
        docs_deleted: DOCS_DELETED.load(Ordering::Relaxed),
        snapshot_files_written: SNAPSHOT_FILES_WRITTEN.load(Ordering::Relaxed),
        snapshot_files_loaded: SNAPSHOT_FILES_LOADED.load(Ordering::Relaxed),
        snapshot_files_skipped: SNAPSHOT_FILES_SKIPPED.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    for c in [
        &DOCS_READ,
        &BATCHES_COMMITTED,
        &DOCS_WRITTEN,
        &SINGLE_WRITES_ISSUED,
        &WRITE_FAILURES,
        &DOCS_DELETED,
        &SNAPSHOT_FILES_WRITTEN,
        &SNAPSHOT_FILES_LOADED,
        &SNAPSHOT_FILES_SKIPPED,
    ] {
        c.store(0, Ordering::Relaxed);
    }
}
