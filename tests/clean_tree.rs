use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use firestore_cli::clean::{delete_documents, ensure_emulator, tree_paths};
use firestore_cli::tree::{full_dump, list_tree};
use firestore_cli::{CollectionFilter, Document, DocumentStore, LocalStore, StoreValue, ToolConfig};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let base = std::env::temp_dir();
    base.join(format!("fscli-clean-{prefix}-{pid}-{t}-{id}"))
}

fn body(n: i64) -> Document {
    let mut d = Document::new();
    d.insert("n".into(), StoreValue::Integer(n));
    d
}

#[test]
fn tree_lists_ids_per_collection() -> Result<()> {
    let root = unique_root("tree");
    let store = LocalStore::open(&root)?;
    store.set("users/bob", body(1), Default::default())?;
    store.set("users/alice", body(2), Default::default())?;
    store.set("posts/p1", body(3), Default::default())?;

    let tree = list_tree(&store, &CollectionFilter::All)?;
    assert_eq!(tree.collection_names(), vec!["posts", "users"]);
    assert_eq!(
        tree_paths(&tree),
        vec!["posts/p1", "users/alice", "users/bob"]
    );

    let only = list_tree(&store, &CollectionFilter::from_names(vec!["users".into()]))?;
    assert_eq!(only.collection_names(), vec!["users"]);
    let ghost = list_tree(&store, &CollectionFilter::from_names(vec!["ghost".into()]))?;
    assert!(ghost.is_empty());

    let dump = full_dump(&store, &CollectionFilter::All)?;
    assert_eq!(dump.doc_count(), 3);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn clean_requires_emulator_and_wipes() -> Result<()> {
    let root = unique_root("wipe");
    let cfg = ToolConfig::default().with_store_dir(&root);
    assert!(ensure_emulator(&cfg).is_err());

    let cfg = cfg.with_emulator_host(Some("127.0.0.1:8080"));
    ensure_emulator(&cfg)?;

    let store = LocalStore::open(&cfg.store_dir)?;
    for i in 0..3 {
        store.set(&format!("c/{i}"), body(i), Default::default())?;
    }
    let paths = tree_paths(&list_tree(&store, &CollectionFilter::All)?);
    assert_eq!(delete_documents(&store, &paths)?, 3);
    assert!(list_tree(&store, &CollectionFilter::All)?.is_empty());

    // повторное открытие видит пустой стор
    let reopened = LocalStore::open(&root)?;
    assert!(reopened.list_collections()?.is_empty());

    let _ = fs::remove_dir_all(&root);
    Ok(())
}
