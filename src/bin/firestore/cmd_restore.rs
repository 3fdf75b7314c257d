use anyhow::{bail, Result};
use console::style;

use firestore_cli::restore::{load_for_restore, resolve_snapshot, restore_snapshot, RestoreOptions, WriteMode};
use firestore_cli::snapdir::list_snapshots;
use firestore_cli::snapshot::parse_collection_names;
use firestore_cli::ToolConfig;

use crate::util::{notice, open_store, pick_one, print_tree};

#[allow(clippy::too_many_arguments)]
pub fn exec(
    cfg: &ToolConfig,
    snapshot: Option<String>,
    only: Vec<String>,
    except: Vec<String>,
    dump: bool,
    dry_run: bool,
    verify: bool,
    single: bool,
) -> Result<()> {
    let name = match snapshot {
        Some(n) => n,
        None => {
            let all = list_snapshots(&cfg.data_dir)?;
            if all.is_empty() {
                notice(&format!("No snapshots in {}", cfg.data_dir.display()));
                return Ok(());
            }
            match pick_one("Select a snapshot to restore", &all)? {
                Some(i) => all[i].clone(),
                None => return Ok(()),
            }
        }
    };
    let dir = resolve_snapshot(&cfg.data_dir, &name)?;

    let snapshot = load_for_restore(&dir, &cfg.converter(), verify)?;
    if snapshot.doc_count() == 0 {
        notice("Selected snapshot is empty");
        return Ok(());
    }
    if dump {
        print_tree(&snapshot.tree());
    }

    let opts = RestoreOptions {
        only: parse_collection_names(only),
        except: parse_collection_names(except),
        dry_run,
        verify,
        mode: if single {
            WriteMode::Gated { limit: cfg.write_concurrency }
        } else {
            WriteMode::Batched { batch_size: cfg.batch_size }
        },
    };

    let store = open_store(cfg)?;
    let report = restore_snapshot(&store, &snapshot, &opts, &mut |p| {
        println!("Restored: {} ({}/{})", p.chunk_len, p.written, p.total);
    })?;

    if report.plan.collections.is_empty() {
        notice("Result is empty");
        return Ok(());
    }
    if report.dry_run {
        println!("{}", style("Dry run, nothing written").yellow());
        for c in &report.plan.collections {
            let n = snapshot.collection(c).map(|d| d.len()).unwrap_or(0);
            println!("  {:<24} {} doc(s)", c, n);
        }
        println!(
            "would write {} document(s) in {} batch(es)",
            report.plan.documents,
            if report.plan.batches.is_empty() {
                report.plan.documents
            } else {
                report.plan.batches.len()
            }
        );
        return Ok(());
    }

    if single {
        println!("Restored: {}", report.written);
    }
    if !report.is_complete() {
        for (path, err) in &report.failed {
            println!("  {} {}: {:#}", style("failed").red(), path, err);
        }
        bail!(
            "{} of {} document(s) failed to restore",
            report.failed.len(),
            report.plan.documents
        );
    }
    println!(
        "{} {} document(s) from {}",
        style("Done:").green(),
        report.written,
        name
    );
    Ok(())
}
