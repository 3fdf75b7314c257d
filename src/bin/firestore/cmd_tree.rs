use anyhow::Result;

use firestore_cli::snapshot::parse_collection_names;
use firestore_cli::tree::list_tree;
use firestore_cli::{CollectionFilter, ToolConfig};

use crate::util::{notice, open_store, print_tree};

pub fn exec(cfg: &ToolConfig, collections: Vec<String>) -> Result<()> {
    let store = open_store(cfg)?;
    let filter = CollectionFilter::from_names(parse_collection_names(collections));
    let tree = list_tree(&store, &filter)?;
    if tree.is_empty() {
        notice(if filter.is_all() { "Firestore is empty" } else { "Result is empty" });
        return Ok(());
    }
    print_tree(&tree);
    Ok(())
}
