//! clean: массовое удаление документов. Только для эмулятора.

use anyhow::{bail, Context, Result};
use log::{debug, info};

use crate::config::{ToolConfig, ENV_EMULATOR_HOST};
use crate::metrics::record_docs_deleted;
use crate::snapshot::DocTree;
use crate::store::{join_path, DocumentStore, WriteBatch, MAX_BATCH_OPS};

pub fn ensure_emulator(cfg: &ToolConfig) -> Result<()> {
    if !cfg.is_emulator() {
        bail!(
            "clean is only allowed against the emulator: set {}",
            ENV_EMULATOR_HOST
        );
    }
    Ok(())
}

/// Полные пути документов дерева: коллекции по имени, ID в порядке перечисления.
pub fn tree_paths(tree: &DocTree) -> Vec<String> {
    tree.collections()
        .flat_map(|(c, ids)| ids.keys().map(move |id| join_path(c, id)))
        .collect()
}

/// Удалить документы батчами по MAX_BATCH_OPS. Возвращает число удалённых.
pub fn delete_documents(store: &dyn DocumentStore, paths: &[String]) -> Result<usize> {
    let mut deleted = 0usize;
    for (i, chunk) in paths.chunks(MAX_BATCH_OPS).enumerate() {
        let mut batch = WriteBatch::new();
        for p in chunk {
            batch.delete(p.as_str());
        }
        store.commit(batch).with_context(|| {
            format!(
                "delete batch #{} ({} document(s)); {} deleted before the failure",
                i + 1,
                chunk.len(),
                deleted
            )
        })?;
        deleted += chunk.len();
        record_docs_deleted(chunk.len());
        debug!("clean: batch #{} deleted {} document(s)", i + 1, chunk.len());
    }
    info!("clean: {} document(s) deleted", deleted);
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::tree::list_tree;
    use crate::snapshot::CollectionFilter;
    use crate::value::Document;

    #[test]
    fn refuses_without_emulator() {
        assert!(ensure_emulator(&ToolConfig::default()).is_err());
        let cfg = ToolConfig::default().with_emulator_host(Some("localhost:8080"));
        assert!(ensure_emulator(&cfg).is_ok());
    }

    #[test]
    fn deletes_in_bounded_batches() {
        let store = MemoryStore::new();
        for i in 0..1001 {
            store.insert(&format!("items/{i:04}"), Document::new()).unwrap();
        }
        store.insert("users/alice", Document::new()).unwrap();

        let tree = list_tree(&store, &CollectionFilter::All).unwrap();
        let paths = tree_paths(&tree);
        assert_eq!(paths.len(), 1002);
        assert_eq!(paths.last().map(String::as_str), Some("users/alice"));

        assert_eq!(delete_documents(&store, &paths).unwrap(), 1002);
        assert_eq!(store.commit_sizes(), vec![500, 500, 2]);
        assert_eq!(store.doc_count(), 0);
    }
}
