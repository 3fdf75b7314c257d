use anyhow::Result;
use console::style;

use firestore_cli::clean::{delete_documents, ensure_emulator, tree_paths};
use firestore_cli::tree::list_tree;
use firestore_cli::{CollectionFilter, ToolConfig};

use crate::util::{confirm, notice, open_store, pick_many};

pub fn exec(cfg: &ToolConfig, all: bool, yes: bool) -> Result<()> {
    ensure_emulator(cfg)?;
    let store = open_store(cfg)?;

    let paths = tree_paths(&list_tree(&store, &CollectionFilter::All)?);
    if paths.is_empty() {
        notice("Firestore is empty");
        return Ok(());
    }

    let selected: Vec<String> = if all {
        paths
    } else {
        pick_many("Select documents to delete (Space to toggle)", &paths)?
            .into_iter()
            .filter_map(|i| paths.get(i).cloned())
            .collect()
    };
    if selected.is_empty() {
        notice("Nothing selected");
        return Ok(());
    }

    let prompt = format!("Delete {} document(s)?", selected.len());
    if !confirm(&prompt, yes)? {
        notice("Aborted, nothing deleted");
        return Ok(());
    }
    let n = delete_documents(&store, &selected)?;
    println!("{} {}", style("Deleted:").red(), n);
    Ok(())
}
