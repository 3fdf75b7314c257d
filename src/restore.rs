//! restore: восстановление стора из папки снапшота.
//!
//! Конвейер:
//!   load_snapshot_dir (сканирование + from_portable)
//!     → select(only, except)  (include, затем exclude; exclude побеждает)
//!     → into_items()          (коллекции по имени, документы в порядке файлов)
//!     → BatchWriter | write_gated
//!
//! Ошибки коммита не ретраятся: уже закоммиченные батчи остаются в сторе.
//! В gated-режиме частичный успех возвращается в отчёте (failed), а не ошибкой.

use anyhow::{bail, Context, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::converter::Converter;
use crate::snapdir::{list_snapshots, load_snapshot_dir, snapshot_converter, verify_snapshot_dir};
use crate::snapshot::Snapshot;
use crate::store::{DocumentStore, MAX_BATCH_OPS};
use crate::writer::{plan_chunks, write_gated, BatchWriter, WriteProgress};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    /// Атомарные батчи по `batch_size` документов.
    Batched { batch_size: usize },
    /// Одиночные записи, не более `limit` одновременно.
    Gated { limit: usize },
}

impl Default for WriteMode {
    fn default() -> Self {
        WriteMode::Batched {
            batch_size: MAX_BATCH_OPS,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RestoreOptions {
    pub only: Vec<String>,
    pub except: Vec<String>,
    pub dry_run: bool,
    pub verify: bool,
    pub mode: WriteMode,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RestorePlan {
    pub collections: Vec<String>,
    pub documents: usize,
    /// Размеры батчей (пусто для gated-режима).
    pub batches: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct RestoreReport {
    pub plan: RestorePlan,
    pub dry_run: bool,
    pub written: usize,
    pub failed: Vec<(String, anyhow::Error)>,
}

impl RestoreReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Найти снапшот по имени папки в `data_dir`.
pub fn resolve_snapshot(data_dir: &Path, name: &str) -> Result<PathBuf> {
    let all = list_snapshots(data_dir)?;
    if !all.iter().any(|s| s == name) {
        bail!(
            "snapshot '{}' does not exist in {}",
            name,
            data_dir.display()
        );
    }
    Ok(data_dir.join(name))
}

pub fn plan(selected: &Snapshot, mode: WriteMode) -> RestorePlan {
    let documents = selected.doc_count();
    RestorePlan {
        collections: selected.collection_names(),
        documents,
        batches: match mode {
            WriteMode::Batched { batch_size } => plan_chunks(documents, batch_size),
            WriteMode::Gated { .. } => Vec::new(),
        },
    }
}

/// Записать (отфильтрованный) снапшот в стор.
pub fn restore_snapshot(
    store: &dyn DocumentStore,
    snapshot: &Snapshot,
    opts: &RestoreOptions,
    progress: &mut dyn FnMut(WriteProgress),
) -> Result<RestoreReport> {
    let selected = snapshot.select(&opts.only, &opts.except);
    let mut report = RestoreReport {
        plan: plan(&selected, opts.mode),
        dry_run: opts.dry_run,
        ..Default::default()
    };

    if selected.is_empty() {
        info!("restore: no collections selected");
        return Ok(report);
    }
    if opts.dry_run {
        info!(
            "restore (dry-run): {} document(s) in {} collection(s)",
            report.plan.documents,
            report.plan.collections.len()
        );
        return Ok(report);
    }

    let items = selected.into_items();
    match opts.mode {
        WriteMode::Batched { batch_size } => {
            let writer = BatchWriter::new(store, batch_size)?;
            report.written = writer.write_all(items, progress)?;
        }
        WriteMode::Gated { limit } => {
            let single = write_gated(store, items, limit)?;
            report.written = single.written.len();
            report.failed = single.failed;
            if !report.failed.is_empty() {
                warn!(
                    "restore: {} document(s) failed, {} written",
                    report.failed.len(),
                    report.written
                );
            }
        }
    }
    Ok(report)
}

/// Загрузить папку снапшота; с `verify` сначала сверить CRC из manifest.json.
/// Кодировка timestamp'ов берётся из manifest.json, если он есть.
pub fn load_for_restore(dir: &Path, converter: &Converter, verify: bool) -> Result<Snapshot> {
    if verify {
        let v = verify_snapshot_dir(dir)?;
        if !v.is_ok() {
            bail!(
                "snapshot {} failed verification:\n  {}",
                dir.display(),
                v.problems.join("\n  ")
            );
        }
        if v.manifest_present {
            info!("restore: verified {} file(s)", v.checked);
        }
    }
    let converter = snapshot_converter(dir, converter)?;
    load_snapshot_dir(dir, &converter).with_context(|| format!("load snapshot {}", dir.display()))
}

pub fn restore_from_dir(
    store: &dyn DocumentStore,
    dir: &Path,
    converter: &Converter,
    opts: &RestoreOptions,
    progress: &mut dyn FnMut(WriteProgress),
) -> Result<RestoreReport> {
    let snapshot = load_for_restore(dir, converter, opts.verify)?;
    restore_snapshot(store, &snapshot, opts, progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::value::{Document, StoreValue};

    fn body(n: i64) -> Document {
        let mut d = Document::new();
        d.insert("n".into(), StoreValue::Integer(n));
        d
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> Snapshot {
        let mut s = Snapshot::new();
        s.insert("users", "alice", body(1));
        s.insert("users", "bob", body(2));
        s.insert("posts", "p1", body(3));
        s
    }

    #[test]
    fn writes_selected_collections_only() {
        let store = MemoryStore::new();
        let opts = RestoreOptions {
            except: names(&["posts"]),
            ..Default::default()
        };
        let report = restore_snapshot(&store, &sample(), &opts, &mut |_| {}).unwrap();
        assert_eq!(report.written, 2);
        assert_eq!(report.plan.collections, names(&["users"]));
        assert!(store.get("users/alice").unwrap().exists());
        assert!(!store.get("posts/p1").unwrap().exists());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let store = MemoryStore::new();
        let opts = RestoreOptions {
            dry_run: true,
            mode: WriteMode::Batched { batch_size: 2 },
            ..Default::default()
        };
        let report = restore_snapshot(&store, &sample(), &opts, &mut |_| {}).unwrap();
        assert_eq!(report.written, 0);
        assert_eq!(report.plan.batches, vec![2, 1]);
        assert_eq!(store.commit_count(), 0);
    }

    #[test]
    fn overlapping_filters_select_nothing() {
        let store = MemoryStore::new();
        let opts = RestoreOptions {
            only: names(&["users"]),
            except: names(&["users"]),
            ..Default::default()
        };
        let report = restore_snapshot(&store, &sample(), &opts, &mut |_| {}).unwrap();
        assert_eq!(report.written, 0);
        assert_eq!(store.commit_count(), 0);
    }

    #[test]
    fn gated_mode_reports_partial_success() {
        let store = MemoryStore::new();
        store.fail_writes_for("users/bob");
        let opts = RestoreOptions {
            mode: WriteMode::Gated { limit: 2 },
            ..Default::default()
        };
        let report = restore_snapshot(&store, &sample(), &opts, &mut |_| {}).unwrap();
        assert_eq!(report.written, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "users/bob");
        assert!(!report.is_complete());
    }

    #[test]
    fn unknown_snapshot_name_is_an_error() {
        let dir = std::env::temp_dir().join(format!("fscli-restore-unknown-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("2024_01_01 00_00_00")).unwrap();
        assert!(resolve_snapshot(&dir, "2024_01_01 00_00_00").is_ok());
        assert!(resolve_snapshot(&dir, "nope").is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
