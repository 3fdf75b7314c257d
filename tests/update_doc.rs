use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use firestore_cli::diff::ChangeKind;
use firestore_cli::update::{
    apply_update, list_update_files, load_patch, parse_doc_arg, prepare_update, wrap_at_path,
    UpdateMode,
};
use firestore_cli::{Converter, Document, DocumentStore, LocalStore, StoreValue};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let base = std::env::temp_dir();
    base.join(format!("fscli-update-{prefix}-{pid}-{t}-{id}"))
}

fn seed(store: &dyn DocumentStore) -> Result<()> {
    let mut addr = Document::new();
    addr.insert("city".into(), "Hanoi".into());
    addr.insert("zip".into(), "100000".into());
    let mut d = Document::new();
    d.insert("name".into(), "Alice".into());
    d.insert("address".into(), StoreValue::Map(addr));
    store.set("users/alice", d, Default::default())
}

#[test]
fn merge_from_file_keeps_date_strings() -> Result<()> {
    let root = unique_root("merge");
    let store = LocalStore::open(root.join("store"))?;
    seed(&store)?;

    let data = root.join("data");
    fs::create_dir_all(&data)?;
    fs::write(
        data.join("patch.json"),
        r#"{"address":{"city":"Hue"},"seen":"2021-05-06T07:08:09.000Z"}"#,
    )?;
    fs::write(data.join("other.json"), "{}")?;
    assert_eq!(list_update_files(&data)?, vec!["other.json", "patch.json"]);

    let patch = load_patch(&data.join("patch.json"), &Converter::raw())?;
    let plan = prepare_update(&store, &parse_doc_arg("users/alice")?, patch, UpdateMode::Merge)?;

    let kinds: Vec<(&str, ChangeKind)> =
        plan.changes.iter().map(|c| (c.path.as_str(), c.kind)).collect();
    assert_eq!(
        kinds,
        vec![("address.city", ChangeKind::Modified), ("seen", ChangeKind::Added)]
    );

    apply_update(&store, &plan)?;
    let now = store.get("users/alice")?.data.unwrap();
    assert_eq!(now.get("name"), Some(&StoreValue::from("Alice")));
    let addr = now.get("address").and_then(|v| v.as_map()).unwrap();
    assert_eq!(addr.get("city"), Some(&StoreValue::from("Hue")));
    assert_eq!(addr.get("zip"), Some(&StoreValue::from("100000")));
    // файл обновления пишется как есть: дата остаётся строкой
    assert_eq!(
        now.get("seen"),
        Some(&StoreValue::from("2021-05-06T07:08:09.000Z"))
    );

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn replace_under_literal_path() -> Result<()> {
    let root = unique_root("path");
    let store = LocalStore::open(root.join("store"))?;
    seed(&store)?;

    let mut data = Document::new();
    data.insert("theme".into(), "dark".into());
    let patch = wrap_at_path(data, Some("settings.ui"));
    let plan = prepare_update(&store, "users/alice", patch, UpdateMode::Replace)?;
    apply_update(&store, &plan)?;

    let now = store.get("users/alice")?.data.unwrap();
    assert_eq!(now.len(), 1);
    assert!(now.contains_key("settings.ui"));
    assert!(!now.contains_key("settings"));

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn update_creates_missing_document() -> Result<()> {
    let root = unique_root("create");
    let store = LocalStore::open(root.join("store"))?;
    let mut data = Document::new();
    data.insert("n".into(), StoreValue::Integer(1));
    let plan = prepare_update(&store, "users/zed", data.clone(), UpdateMode::Merge)?;
    assert!(plan.current.is_none());
    assert!(!plan.is_noop());
    apply_update(&store, &plan)?;
    assert_eq!(store.get("users/zed")?.data, Some(data));

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn input_validation() -> Result<()> {
    let root = unique_root("validate");
    assert!(parse_doc_arg("users").is_err());
    assert!("append".parse::<UpdateMode>().is_err());
    assert!(load_patch(&root.join("missing.json"), &Converter::default()).is_err());

    fs::create_dir_all(&root)?;
    fs::write(root.join("list.json"), "[1,2]")?;
    assert!(load_patch(&root.join("list.json"), &Converter::default()).is_err());
    fs::write(root.join("empty.json"), "{}")?;
    assert!(load_patch(&root.join("empty.json"), &Converter::default())?.is_empty());

    let _ = fs::remove_dir_all(&root);
    Ok(())
}
