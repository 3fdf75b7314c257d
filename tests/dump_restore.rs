use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use firestore_cli::dump::{dump_to_dir, DumpOptions};
use firestore_cli::restore::{restore_from_dir, RestoreOptions, WriteMode};
use firestore_cli::snapdir::{load_snapshot_dir, verify_snapshot_dir, MANIFEST_FILE};
use firestore_cli::{
    Converter, Document, DocumentStore, LocalStore, MemoryStore, StoreValue, TimestampEncoding,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let base = std::env::temp_dir();
    base.join(format!("fscli-dump-{prefix}-{pid}-{t}-{id}"))
}

fn at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 9)
        .and_then(|d| d.and_hms_opt(14, 5, 7))
        .unwrap()
}

fn alice() -> Document {
    let mut d = Document::new();
    d.insert("name".into(), "Alice".into());
    d.insert(
        "joined".into(),
        StoreValue::Timestamp(DateTime::from_timestamp_millis(1_577_934_245_123).unwrap()),
    );
    d.insert("age".into(), StoreValue::Integer(30));
    d
}

fn seed(store: &dyn DocumentStore) -> Result<()> {
    store.set("users/alice", alice(), Default::default())?;
    let mut bob = Document::new();
    bob.insert("name".into(), "Bob".into());
    store.set("users/bob", bob, Default::default())?;
    let mut p = Document::new();
    p.insert("title".into(), "2nd post".into());
    store.set("posts/p1", p, Default::default())?;
    Ok(())
}

/// dump → restore в пустой стор даёт те же документы (timestamp с точностью до мс).
#[test]
fn dump_then_restore_roundtrip() -> Result<()> {
    let root = unique_root("roundtrip");
    let src = LocalStore::open(root.join("src"))?;
    seed(&src)?;

    let cvt = Converter::default();
    let data_dir = root.join("data");
    let report = dump_to_dir(&src, &cvt, &data_dir, &DumpOptions::default(), at())?
        .expect("store is not empty");
    assert_eq!(report.dir, data_dir.join("2024_03_09 14_05_07"));
    assert_eq!(report.manifest.documents, 3);

    // canonical + sorted файлы
    let raw = fs::read_to_string(report.dir.join("users").join("alice.json"))?;
    assert!(raw.contains(r#""joined":"2020-01-02T03:04:05.123Z""#));
    assert!(report.dir.join("users").join("_alice.sorted.json").exists());
    assert!(report.dir.join(MANIFEST_FILE).exists());

    let dst = LocalStore::open(root.join("dst"))?;
    let restored = restore_from_dir(&dst, &report.dir, &cvt, &RestoreOptions::default(), &mut |_| {})?;
    assert_eq!(restored.written, 3);
    assert_eq!(dst.get("users/alice")?.data, Some(alice()));
    assert_eq!(dst.list_collections()?, vec!["posts", "users"]);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn empty_store_dumps_nothing() -> Result<()> {
    let root = unique_root("empty");
    let store = MemoryStore::new();
    let res = dump_to_dir(&store, &Converter::default(), &root, &DumpOptions::default(), at())?;
    assert!(res.is_none());
    assert!(!root.exists());
    Ok(())
}

#[test]
fn dump_with_label_and_filters() -> Result<()> {
    let root = unique_root("label");
    let store = MemoryStore::new();
    seed(&store)?;
    let opts = DumpOptions {
        label: Some("before migration".into()),
        only: vec![],
        except: vec!["posts".into()],
    };
    let report = dump_to_dir(&store, &Converter::default(), &root, &opts, at())?.unwrap();
    assert!(report
        .dir
        .ends_with("2024_03_09 14_05_07 - before migration"));
    assert_eq!(report.snapshot.collection_names(), vec!["users"]);

    // второй dump в ту же секунду не перезаписывает папку
    assert!(dump_to_dir(&store, &Converter::default(), &root, &opts, at()).is_err());

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

/// Служебные `_*.json` пропускаются, числовой префикс `NN.` срезается,
/// пустая папка-коллекция остаётся пустой коллекцией.
#[test]
fn snapshot_scan_rules() -> Result<()> {
    let dir = unique_root("scan");
    fs::create_dir_all(dir.join("users"))?;
    fs::create_dir_all(dir.join("empty"))?;
    fs::write(dir.join("users").join("02.foo.json"), r#"{"a":1}"#)?;
    fs::write(dir.join("users").join("_1.sorted.json"), r#"{"junk":true}"#)?;
    fs::write(dir.join("users").join("notes.txt"), "ignored")?;

    let snap = load_snapshot_dir(&dir, &Converter::default())?;
    assert_eq!(snap.collection_names(), vec!["empty", "users"]);
    let users = snap.collection("users").unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users.get("foo").and_then(|d| d.get("a")), Some(&StoreValue::Integer(1)));
    assert_eq!(snap.collection("empty").map(|c| c.len()), Some(0));

    let _ = fs::remove_dir_all(&dir);
    Ok(())
}

#[test]
fn overlapping_only_and_except_write_nothing() -> Result<()> {
    let root = unique_root("overlap");
    let src = MemoryStore::new();
    seed(&src)?;
    let report = dump_to_dir(&src, &Converter::default(), &root, &DumpOptions::default(), at())?
        .unwrap();

    let dst = MemoryStore::new();
    let opts = RestoreOptions {
        only: vec!["users".into()],
        except: vec!["users".into()],
        ..Default::default()
    };
    let r = restore_from_dir(&dst, &report.dir, &Converter::default(), &opts, &mut |_| {})?;
    assert_eq!(r.written, 0);
    assert!(r.plan.collections.is_empty());
    assert_eq!(dst.commit_count(), 0);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn verify_detects_tampering() -> Result<()> {
    let root = unique_root("verify");
    let src = MemoryStore::new();
    seed(&src)?;
    let report = dump_to_dir(&src, &Converter::default(), &root, &DumpOptions::default(), at())?
        .unwrap();

    let clean = verify_snapshot_dir(&report.dir)?;
    assert!(clean.manifest_present);
    assert_eq!(clean.checked, 3);
    assert!(clean.is_ok());

    fs::write(report.dir.join("users").join("bob.json"), r#"{"name":"Mallory"}"#)?;
    let bad = verify_snapshot_dir(&report.dir)?;
    assert_eq!(bad.problems.len(), 1);
    assert!(bad.problems[0].starts_with("users/bob.json"));

    let dst = MemoryStore::new();
    let opts = RestoreOptions {
        verify: true,
        ..Default::default()
    };
    assert!(restore_from_dir(&dst, &report.dir, &Converter::default(), &opts, &mut |_| {}).is_err());
    assert_eq!(dst.doc_count(), 0);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn envelope_encoding_survives_lexical_off() -> Result<()> {
    let root = unique_root("envelope");
    let src = MemoryStore::new();
    src.insert("users/alice", alice())?;
    let cvt = Converter::default()
        .with_encoding(TimestampEncoding::Envelope)
        .with_lexical_dates(false);
    let report = dump_to_dir(&src, &cvt, &root, &DumpOptions::default(), at())?.unwrap();

    let dst = MemoryStore::new();
    let opts = RestoreOptions {
        mode: WriteMode::Gated { limit: 1 },
        ..Default::default()
    };
    let r = restore_from_dir(&dst, &report.dir, &cvt, &opts, &mut |_| {})?;
    assert!(r.is_complete());
    assert_eq!(dst.get("users/alice")?.data, Some(alice()));

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn envelope_shaped_map_survives_iso_snapshot() -> Result<()> {
    let root = unique_root("envelope-shape");
    let mut meta = Document::new();
    meta.insert("$type".into(), "timestamp".into());
    meta.insert("value".into(), "2021-01-01T00:00:00.000+01:00".into());
    let mut body = Document::new();
    body.insert("meta".into(), StoreValue::Map(meta));

    let src = MemoryStore::new();
    src.insert("c/d", body.clone())?;
    let cvt = Converter::default();
    let report = dump_to_dir(&src, &cvt, &root, &DumpOptions::default(), at())?.unwrap();

    let dst = MemoryStore::new();
    restore_from_dir(&dst, &report.dir, &cvt, &RestoreOptions::default(), &mut |_| {})?;
    assert_eq!(dst.get("c/d")?.data, Some(body));

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn restore_follows_manifest_encoding() -> Result<()> {
    let root = unique_root("manifest-enc");
    let src = MemoryStore::new();
    src.insert("users/alice", alice())?;
    let typed = Converter::default().with_encoding(TimestampEncoding::Envelope);
    let report = dump_to_dir(&src, &typed, &root, &DumpOptions::default(), at())?.unwrap();

    // restore с конвертером по умолчанию (iso): envelope'ы всё равно распознаются
    let dst = MemoryStore::new();
    restore_from_dir(&dst, &report.dir, &Converter::default(), &RestoreOptions::default(), &mut |_| {})?;
    assert_eq!(dst.get("users/alice")?.data, Some(alice()));

    let _ = fs::remove_dir_all(&root);
    Ok(())
}
