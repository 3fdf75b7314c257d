//! tree: перечисление стора в форму Snapshot.
//!
//! - `list_tree`: только ID документов (без чтения тел): дёшево на больших сторах.
//! - `full_dump`: те же коллекции + bulk get тел; несуществующие документы
//!   (удалены во время перечисления, «пустые» родители подколлекций) пропускаются.

use anyhow::{Context, Result};
use log::debug;

use crate::metrics::record_docs_read;
use crate::snapshot::{CollectionFilter, DocTree, Snapshot};
use crate::store::{join_path, DocumentStore};

fn selected_collections(
    store: &dyn DocumentStore,
    filter: &CollectionFilter,
) -> Result<Vec<String>> {
    let all = store.list_collections().context("list collections")?;
    Ok(all.into_iter().filter(|c| filter.allows(c)).collect())
}

pub fn list_tree(store: &dyn DocumentStore, filter: &CollectionFilter) -> Result<DocTree> {
    let mut tree = DocTree::new();
    for collection in selected_collections(store, filter)? {
        let ids = store
            .list_documents(&collection)
            .with_context(|| format!("list documents of '{}'", collection))?;
        debug!("tree: {} → {} document(s)", collection, ids.len());
        for id in ids {
            tree.insert(&collection, &id, ());
        }
    }
    Ok(tree)
}

pub fn full_dump(store: &dyn DocumentStore, filter: &CollectionFilter) -> Result<Snapshot> {
    let mut snapshot = Snapshot::new();
    for collection in selected_collections(store, filter)? {
        let ids = store
            .list_documents(&collection)
            .with_context(|| format!("list documents of '{}'", collection))?;
        if ids.is_empty() {
            continue;
        }
        let paths: Vec<String> = ids.iter().map(|id| join_path(&collection, id)).collect();
        let docs = store
            .get_all(&paths)
            .with_context(|| format!("read documents of '{}'", collection))?;

        let mut found = 0usize;
        for doc in docs {
            let id = doc.id().to_string();
            if let Some(data) = doc.data {
                snapshot.insert(&collection, &id, data);
                found += 1;
            }
        }
        record_docs_read(found);
        debug!(
            "dump: {} → {} of {} document(s) exist",
            collection,
            found,
            paths.len()
        );
    }
    Ok(snapshot)
}
