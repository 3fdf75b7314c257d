use anyhow::{bail, Result};
use console::style;
use log::warn;
use std::io::Write;
use std::time::Duration;

use firestore_cli::metrics::record_docs_read;
use firestore_cli::store::resolve_doc_arg;
use firestore_cli::watch::{DocWatcher, WatchEvent};
use firestore_cli::{DocumentStore, ToolConfig};

use crate::util::{open_store, print_change, print_doc};

#[allow(clippy::too_many_arguments)]
pub fn exec(
    cfg: &ToolConfig,
    docs: Vec<String>,
    collection: Option<String>,
    json: bool,
    utc: bool,
    watch: bool,
    no_diff: bool,
    beep: bool,
) -> Result<()> {
    let mut paths: Vec<String> = Vec::new();
    for arg in &docs {
        match resolve_doc_arg(arg, collection.as_deref()) {
            Ok(p) if !paths.contains(&p) => paths.push(p),
            Ok(_) => {}
            Err(e) => warn!("skipping '{}': {:#}", arg, e),
        }
    }
    if paths.is_empty() {
        bail!("no valid document given (use <collection>/<doc-id> or --collection)");
    }

    let store = open_store(cfg)?;
    let converter = cfg.converter();

    let snaps = store.get_all(&paths)?;
    record_docs_read(snaps.len());
    for s in &snaps {
        print_doc(s, &converter, json, utc)?;
    }
    if !watch {
        return Ok(());
    }

    let mut watcher = DocWatcher::new();
    for s in &snaps {
        watcher.observe(s);
    }
    let interval = Duration::from_millis(cfg.watch_interval_ms);
    println!(
        "{}",
        style(format!("watching {} document(s), Ctrl-C to stop", watcher.tracked())).dim()
    );

    loop {
        std::thread::sleep(interval);
        let snaps = store.get_all(&paths)?;
        record_docs_read(snaps.len());
        for s in &snaps {
            let Some(WatchEvent::Changed { path, version, changes }) = watcher.observe(s) else {
                continue;
            };
            if beep {
                print!("\x07");
                std::io::stdout().flush()?;
            }
            if no_diff || json {
                print_doc(s, &converter, json, utc)?;
                continue;
            }
            println!("{} v{}", style(&path).cyan().bold(), version);
            for c in &changes {
                print_change(c, &converter);
            }
        }
    }
}
