//! dump: выгрузка стора в папку снапшота.
//!
//! Конвейер: full_dump (Tree Dumper) → select(only, except) → write_snapshot_dir.
//! Пустой результат: не ошибка: возвращается None, папка не создаётся.

use anyhow::{bail, Result};
use chrono::NaiveDateTime;
use log::info;
use std::path::{Path, PathBuf};

use crate::converter::Converter;
use crate::snapdir::{snapshot_dir_name, write_snapshot_dir, SnapshotManifest};
use crate::snapshot::{CollectionFilter, Snapshot};
use crate::store::DocumentStore;
use crate::tree::full_dump;

#[derive(Clone, Debug, Default)]
pub struct DumpOptions {
    /// Суффикс имени папки (`... - <label>`).
    pub label: Option<String>,
    pub only: Vec<String>,
    pub except: Vec<String>,
}

#[derive(Debug)]
pub struct DumpReport {
    pub dir: PathBuf,
    pub snapshot: Snapshot,
    pub manifest: SnapshotManifest,
}

/// Прочитать и отфильтровать снапшот стора (без записи на диск).
pub fn collect(store: &dyn DocumentStore, opts: &DumpOptions) -> Result<Snapshot> {
    let filter = CollectionFilter::from_names(opts.only.clone());
    let snapshot = full_dump(store, &filter)?;
    Ok(snapshot.select(&[], &opts.except))
}

pub fn dump_to_dir(
    store: &dyn DocumentStore,
    converter: &Converter,
    data_dir: &Path,
    opts: &DumpOptions,
    at: NaiveDateTime,
) -> Result<Option<DumpReport>> {
    let snapshot = collect(store, opts)?;
    if snapshot.is_empty() {
        info!("dump: nothing to export");
        return Ok(None);
    }

    let name = snapshot_dir_name(&at, opts.label.as_deref());
    let dir = data_dir.join(&name);
    if dir.exists() {
        bail!("snapshot folder already exists: {}", dir.display());
    }
    info!("dump: exporting to {}", dir.display());

    let manifest = write_snapshot_dir(&dir, &snapshot, converter, opts.label.as_deref())?;
    Ok(Some(DumpReport {
        dir,
        snapshot,
        manifest,
    }))
}
