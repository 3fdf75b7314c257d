use anyhow::Result;
use chrono::Local;
use console::style;

use firestore_cli::dump::{dump_to_dir, DumpOptions};
use firestore_cli::snapshot::parse_collection_names;
use firestore_cli::ToolConfig;

use crate::util::{notice, open_store};

pub fn exec(cfg: &ToolConfig, name: Vec<String>, only: Vec<String>, except: Vec<String>) -> Result<()> {
    let store = open_store(cfg)?;
    let label = name.join(" ");
    let opts = DumpOptions {
        label: Some(label).filter(|l| !l.trim().is_empty()),
        only: parse_collection_names(only),
        except: parse_collection_names(except),
    };
    let filtered = !opts.only.is_empty() || !opts.except.is_empty();

    let report = dump_to_dir(
        &store,
        &cfg.converter(),
        &cfg.data_dir,
        &opts,
        Local::now().naive_local(),
    )?;
    let Some(report) = report else {
        notice(if filtered { "Result is empty" } else { "Firestore is empty" });
        return Ok(());
    };

    for (collection, n) in &report.manifest.collections {
        println!("  {:<24} {} doc(s)", collection, n);
    }
    println!(
        "{} {} document(s) from {} collection(s) → {}",
        style("Dumped").green(),
        report.manifest.documents,
        report.manifest.collections.len(),
        report.dir.display()
    );
    Ok(())
}
