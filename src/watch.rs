//! watch: трекер изменений для `doc --watch`.
//!
//! Хранит последнюю увиденную версию и данные на каждый путь. Карта не ограничена
//! и живёт всю сессию наблюдения (рассчитано на небольшое число документов).
//! Изменение определяется по update_time и данным; версия растёт с каждым изменением.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::diff::{diff_documents, FieldChange};
use crate::store::DocSnapshot;
use crate::value::Document;

#[derive(Clone, Debug, PartialEq)]
struct Seen {
    version: u64,
    update_time: Option<DateTime<Utc>>,
    data: Option<Document>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum WatchEvent {
    /// Первое наблюдение документа (версия 1).
    Initial { path: String, version: u64 },
    /// Документ изменился с прошлого наблюдения.
    Changed {
        path: String,
        version: u64,
        changes: Vec<FieldChange>,
    },
}

impl WatchEvent {
    pub fn path(&self) -> &str {
        match self {
            WatchEvent::Initial { path, .. } | WatchEvent::Changed { path, .. } => path,
        }
    }

    pub fn version(&self) -> u64 {
        match self {
            WatchEvent::Initial { version, .. } | WatchEvent::Changed { version, .. } => *version,
        }
    }
}

#[derive(Debug, Default)]
pub struct DocWatcher {
    latest: HashMap<String, Seen>,
}

impl DocWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracked(&self) -> usize {
        self.latest.len()
    }

    pub fn version_of(&self, path: &str) -> Option<u64> {
        self.latest.get(path).map(|s| s.version)
    }

    /// Учесть свежий снимок; None: если ничего не изменилось.
    pub fn observe(&mut self, snap: &DocSnapshot) -> Option<WatchEvent> {
        match self.latest.get_mut(&snap.path) {
            None => {
                self.latest.insert(
                    snap.path.clone(),
                    Seen {
                        version: 1,
                        update_time: snap.update_time,
                        data: snap.data.clone(),
                    },
                );
                Some(WatchEvent::Initial {
                    path: snap.path.clone(),
                    version: 1,
                })
            }
            Some(seen) => {
                if seen.update_time == snap.update_time && seen.data == snap.data {
                    return None;
                }
                let changes = diff_documents(seen.data.as_ref(), snap.data.as_ref());
                seen.version += 1;
                seen.update_time = snap.update_time;
                seen.data = snap.data.clone();
                Some(WatchEvent::Changed {
                    path: snap.path.clone(),
                    version: seen.version,
                    changes,
                })
            }
        }
    }
}
