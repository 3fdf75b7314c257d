use anyhow::{anyhow, Result};
use console::style;
use std::path::PathBuf;

use firestore_cli::update::{
    apply_update, list_update_files, load_patch, parse_doc_arg, prepare_update, wrap_at_path,
    UpdateMode,
};
use firestore_cli::{Converter, ToolConfig};

use crate::util::{confirm, notice, open_store, pick_one, print_change};

pub fn exec(
    cfg: &ToolConfig,
    doc: Option<String>,
    file: Option<PathBuf>,
    path: Option<String>,
    mode: String,
    yes: bool,
) -> Result<()> {
    let doc = doc.ok_or_else(|| anyhow!("document is required: <collection>/<doc-id>"))?;
    let doc_path = parse_doc_arg(&doc)?;
    let mode: UpdateMode = mode.parse()?;
    let converter = cfg.converter();

    let file = match file {
        Some(f) => f,
        None => {
            let files = list_update_files(&cfg.data_dir)?;
            if files.is_empty() {
                notice(&format!("No files to choose in {}", cfg.data_dir.display()));
                return Ok(());
            }
            match pick_one("Select a file with the new data", &files)? {
                Some(i) => cfg.data_dir.join(&files[i]),
                None => return Ok(()),
            }
        }
    };

    // Файл обновления пишется как есть: без эвристики дат и envelope'ов.
    let patch = load_patch(&file, &Converter::raw())?;
    if patch.is_empty() {
        notice("Selected file is empty");
        return Ok(());
    }
    let patch = wrap_at_path(patch, path.as_deref());

    let store = open_store(cfg)?;
    let plan = prepare_update(&store, &doc_path, patch, mode)?;
    if plan.is_noop() {
        notice("No changes");
        return Ok(());
    }

    if plan.current.is_none() {
        println!("{} does not exist, it will be created", style(&doc_path).cyan());
    }
    println!("{} ({}):", style(&doc_path).cyan().bold(), mode);
    for change in &plan.changes {
        print_change(change, &converter);
    }

    let prompt = format!("Apply {} change(s) to {}?", plan.changes.len(), doc_path);
    if !confirm(&prompt, yes)? {
        notice("Aborted, nothing written");
        return Ok(());
    }
    apply_update(&store, &plan)?;
    println!("{} {}", style("Updated").green(), doc_path);
    Ok(())
}
