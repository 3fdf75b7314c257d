use anyhow::Result;
use console::style;
use serde_json::json;

use firestore_cli::config::{ENV_CREDENTIALS, ENV_EMULATOR_HOST, ENV_PROJECT};
use firestore_cli::store::local::STORE_FILE;
use firestore_cli::{metrics, DocumentStore, LocalStore, ToolConfig};

/// Число коллекций, если стор уже создан; ошибка подключения: строкой.
/// Если идёт запись, стор не читаем (doctor не должен ждать лок).
fn probe(cfg: &ToolConfig) -> (Option<usize>, Option<String>, bool) {
    if !cfg.store_dir.join(STORE_FILE).exists() {
        return (None, None, false);
    }
    let store = match LocalStore::open(&cfg.store_dir) {
        Ok(s) => s,
        Err(e) => return (None, Some(format!("{:#}", e)), false),
    };
    if store.writer_active() {
        return (None, None, true);
    }
    match store.list_collections() {
        Ok(c) => (Some(c.len()), None, false),
        Err(e) => (None, Some(format!("{:#}", e)), false),
    }
}

pub fn exec(cfg: &ToolConfig, json: bool) -> Result<()> {
    let (collections, error, busy) = probe(cfg);

    if json {
        let out = json!({
            "emulator_host": cfg.emulator_host,
            "project_id": cfg.project_id,
            "credentials": cfg.credentials,
            "store_dir": cfg.store_dir.display().to_string(),
            "data_dir": cfg.data_dir.display().to_string(),
            "batch_size": cfg.batch_size,
            "write_concurrency": cfg.write_concurrency,
            "typed_timestamps": cfg.typed_timestamps,
            "collections": collections,
            "writer_active": busy,
            "error": error,
            "metrics": metrics::snapshot(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "(not set)".to_string());
    println!("{:<32} {}", ENV_EMULATOR_HOST, show(&cfg.emulator_host));
    println!("{:<32} {}", ENV_PROJECT, show(&cfg.project_id));
    println!("{:<32} {}", ENV_CREDENTIALS, show(&cfg.credentials));
    println!("{:<32} {}", "store dir", cfg.store_dir.display());
    println!("{:<32} {}", "data dir", cfg.data_dir.display());
    println!("{:<32} {} / {}", "batch size / write concurrency", cfg.batch_size, cfg.write_concurrency);
    match (collections, error) {
        (None, None) if busy => println!("{:<32} {}", "store", style("busy: write in progress").yellow()),
        (Some(n), _) => println!("{:<32} {} ({} collection(s))", "store", style("ok").green(), n),
        (None, Some(e)) => println!("{:<32} {} {}", "store", style("error").red(), e),
        (None, None) => println!("{:<32} {}", "store", style("not created yet").yellow()),
    }
    if !cfg.is_emulator() {
        println!("{}", style("clean is disabled: emulator host is not set").dim());
    }
    Ok(())
}
