//! state: общее in-memory состояние для бэкендов (MemoryStore, LocalStore).
//!
//! Документы хранятся по полному пути (`col/doc[/sub/doc...]`) в BTreeMap,
//! поэтому перечисления детерминированы (лексикографический порядок).

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

use super::{validate_collection_path, DocReader, DocSnapshot, WriteBatch, WriteOp};
use crate::value::{merge_fields, Document};

#[derive(Clone, Debug, PartialEq)]
pub struct StoredDoc {
    pub data: Document,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StoreState {
    pub docs: BTreeMap<String, StoredDoc>,
}

impl StoreState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Top-level коллекции, у которых есть хотя бы один потомок-документ.
    pub fn list_collections(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self
            .docs
            .keys()
            .filter_map(|p| p.split('/').next())
            .collect();
        names.into_iter().map(str::to_string).collect()
    }

    /// ID документов прямо в коллекции. Как и у настоящего стора, сюда попадают и
    /// «отсутствующие» документы, у которых есть только подколлекции.
    pub fn list_documents(&self, collection: &str) -> Result<Vec<String>> {
        validate_collection_path(collection)?;
        let prefix = format!("{}/", collection);
        // "bob-x" сортируется между "bob" и "bob/posts/..", поэтому дедуп через set.
        let mut ids: BTreeSet<&str> = BTreeSet::new();
        for path in self.docs.range(prefix.clone()..).map(|(p, _)| p) {
            let Some(rest) = path.strip_prefix(&prefix) else {
                break;
            };
            ids.insert(rest.split('/').next().unwrap_or(rest));
        }
        Ok(ids.into_iter().map(str::to_string).collect())
    }

    pub fn snapshot_of(&self, path: &str) -> DocSnapshot {
        match self.docs.get(path) {
            Some(d) => DocSnapshot {
                path: path.to_string(),
                data: Some(d.data.clone()),
                create_time: Some(d.create_time),
                update_time: Some(d.update_time),
            },
            None => DocSnapshot::missing(path),
        }
    }

    /// Применить батч. Батч должен быть заранее провалидирован (`WriteBatch::validate`):
    /// после валидации применение не может упасть, что и даёт атомарность.
    pub fn apply(&mut self, batch: WriteBatch, now: DateTime<Utc>) {
        for op in batch.into_ops() {
            match op {
                WriteOp::Set { path, data, opts } => {
                    match self.docs.get_mut(&path) {
                        Some(existing) => {
                            if opts.merge {
                                merge_fields(&mut existing.data, data);
                            } else {
                                existing.data = data;
                            }
                            existing.update_time = now;
                        }
                        None => {
                            self.docs.insert(
                                path,
                                StoredDoc {
                                    data,
                                    create_time: now,
                                    update_time: now,
                                },
                            );
                        }
                    }
                }
                WriteOp::Delete { path } => {
                    self.docs.remove(&path);
                }
            }
        }
    }
}

impl DocReader for StoreState {
    fn read(&self, path: &str) -> Result<DocSnapshot> {
        Ok(self.snapshot_of(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SetOptions;
    use crate::value::StoreValue;

    fn doc(k: &str, v: i64) -> Document {
        let mut d = Document::new();
        d.insert(k.to_string(), StoreValue::Integer(v));
        d
    }

    #[test]
    fn list_documents_includes_parents_of_subcollections() {
        let mut st = StoreState::new();
        let mut b = WriteBatch::new();
        b.set("users/alice", doc("a", 1))
            .set("users/bob/posts/p1", doc("p", 1))
            .set("users2/x", doc("x", 1));
        st.apply(b, Utc::now());

        assert_eq!(st.list_collections(), vec!["users", "users2"]);
        assert_eq!(st.list_documents("users").unwrap(), vec!["alice", "bob"]);
        assert_eq!(st.list_documents("users/bob/posts").unwrap(), vec!["p1"]);
        assert!(!st.snapshot_of("users/bob").exists());
    }

    #[test]
    fn replace_keeps_create_time_and_merge_merges() {
        let mut st = StoreState::new();
        let t0 = Utc::now();
        let mut b = WriteBatch::new();
        b.set("c/d", doc("a", 1));
        st.apply(b, t0);

        let t1 = t0 + chrono::Duration::seconds(5);
        let mut b = WriteBatch::new();
        b.set_with("c/d", doc("b", 2), SetOptions::merge());
        st.apply(b, t1);
        let got = st.snapshot_of("c/d");
        assert_eq!(got.create_time, Some(t0));
        assert_eq!(got.update_time, Some(t1));
        assert_eq!(got.data.as_ref().unwrap().len(), 2);

        let mut b = WriteBatch::new();
        b.set("c/d", doc("z", 9));
        st.apply(b, t1);
        assert_eq!(st.snapshot_of("c/d").data, Some(doc("z", 9)));

        let mut b = WriteBatch::new();
        b.delete("c/d");
        st.apply(b, t1);
        assert!(st.is_empty());
    }
}
