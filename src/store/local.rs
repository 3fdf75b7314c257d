//! LocalStore: локальный эмулятор стора на диске.
//!
//! Формат: <store_dir>/store.json
//! {
//!   "version": 2,
//!   "documents": {
//!     "users/alice": {"create_time": "...", "update_time": "...",
//!                     "data": {"name": {"type": "string", "value": "Alice"}}}
//!   }
//! }
//! Значения пишутся serde-формой StoreValue (тег типа у каждого значения), без
//! Converter: файл стора не знает ни про эвристику дат, ни про envelope'ы.
//!
//! Каждая операция: лок (<store_dir>/LOCK) → load → (apply → atomic rewrite).
//! Перезапись атомарна: store.json.tmp + rename.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::state::{StoreState, StoredDoc};
use super::{validate_doc_path, DocSnapshot, DocumentStore, Transaction, TxnFn, WriteBatch};
use crate::lock::{acquire_lock, try_acquire_lock, LockMode};
use crate::value::Document;

pub const STORE_FILE: &str = "store.json";
pub const STORE_FORMAT_VERSION: u32 = 2;

#[derive(Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    documents: IndexMap<String, StoredDocFile>,
}

#[derive(Serialize, Deserialize)]
struct StoredDocFile {
    create_time: DateTime<Utc>,
    update_time: DateTime<Utc>,
    data: Document,
}

pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Открыть (и при необходимости создать) каталог стора.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("create store dir {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_file(&self) -> PathBuf {
        self.root.join(STORE_FILE)
    }

    fn load(&self) -> Result<StoreState> {
        let path = self.store_file();
        if !path.exists() {
            return Ok(StoreState::new());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("read store file {}", path.display()))?;
        let file: StoreFile = serde_json::from_str(&raw)
            .with_context(|| format!("parse store file {}", path.display()))?;
        if file.version != STORE_FORMAT_VERSION {
            bail!(
                "unsupported store format version {} in {}",
                file.version,
                path.display()
            );
        }
        let mut st = StoreState::new();
        for (p, d) in file.documents {
            st.docs.insert(
                p,
                StoredDoc {
                    data: d.data,
                    create_time: d.create_time,
                    update_time: d.update_time,
                },
            );
        }
        Ok(st)
    }

    fn save(&self, st: &StoreState) -> Result<()> {
        let documents = st
            .docs
            .iter()
            .map(|(p, d)| {
                (
                    p.clone(),
                    StoredDocFile {
                        create_time: d.create_time,
                        update_time: d.update_time,
                        data: d.data.clone(),
                    },
                )
            })
            .collect();
        let file = StoreFile {
            version: STORE_FORMAT_VERSION,
            documents,
        };
        let bytes = serde_json::to_vec(&file).context("serialize store file")?;

        let path = self.store_file();
        let tmp = self.root.join(format!("{}.tmp", STORE_FILE));
        {
            let mut f = fs::File::create(&tmp)
                .with_context(|| format!("create {}", tmp.display()))?;
            f.write_all(&bytes)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &path)
            .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
        debug!("local store: saved {} document(s) to {}", st.len(), path.display());
        Ok(())
    }

    /// Держит ли кто-то сейчас эксклюзивный лок (идёт запись). Не блокирует.
    pub fn writer_active(&self) -> bool {
        match try_acquire_lock(&self.root, LockMode::Shared) {
            Ok(_lock) => false,
            Err(e) => {
                debug!("local store: shared lock unavailable: {:#}", e);
                true
            }
        }
    }

    fn read_state<T>(&self, f: impl FnOnce(&StoreState) -> Result<T>) -> Result<T> {
        let _lock = acquire_lock(&self.root, LockMode::Shared)?;
        let st = self.load()?;
        f(&st)
    }

    fn write_state(&self, f: impl FnOnce(&mut StoreState) -> Result<()>) -> Result<()> {
        let _lock = acquire_lock(&self.root, LockMode::Exclusive)?;
        let mut st = self.load()?;
        f(&mut st)?;
        self.save(&st)
    }
}

impl DocumentStore for LocalStore {
    fn describe(&self) -> String {
        format!("local ({})", self.store_file().display())
    }

    fn list_collections(&self) -> Result<Vec<String>> {
        self.read_state(|st| Ok(st.list_collections()))
    }

    fn list_documents(&self, collection: &str) -> Result<Vec<String>> {
        self.read_state(|st| st.list_documents(collection))
    }

    fn get_all(&self, paths: &[String]) -> Result<Vec<DocSnapshot>> {
        for p in paths {
            validate_doc_path(p)?;
        }
        self.read_state(|st| Ok(paths.iter().map(|p| st.snapshot_of(p)).collect()))
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        batch.validate()?;
        self.write_state(|st| {
            st.apply(batch, Utc::now());
            Ok(())
        })
    }

    fn run_transaction(&self, f: &mut TxnFn<'_>) -> Result<()> {
        self.write_state(|st| {
            let writes = {
                let mut txn = Transaction::new(&*st);
                f(&mut txn)?;
                txn.into_writes()
            };
            writes
                .validate()
                .map_err(|e| anyhow!("transaction rejected: {:#}", e))?;
            st.apply(writes, Utc::now());
            Ok(())
        })
    }
}
