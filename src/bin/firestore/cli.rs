use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Инструменты оператора для документного стора: dump / restore / update / clean
#[derive(Parser, Debug)]
#[command(name = "firestore", version, about = "Document store operator CLI")]
pub struct Cli {
    /// Включить debug-логи (иначе RUST_LOG или info)
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Dump all collections into a new snapshot folder
    Dump {
        /// Optional name appended to the folder: "<date> - <name>"
        name: Vec<String>,
        /// Dump only these collections (repeat or comma-separate)
        #[arg(long)]
        only: Vec<String>,
        /// Skip these collections
        #[arg(long)]
        except: Vec<String>,
    },
    /// Restore a snapshot folder into the store
    Restore {
        /// Snapshot folder name; interactive selection when omitted
        snapshot: Option<String>,
        #[arg(long)]
        only: Vec<String>,
        #[arg(long)]
        except: Vec<String>,
        /// Print the snapshot tree before restoring
        #[arg(long)]
        dump: bool,
        /// Show what would be written, write nothing
        #[arg(long)]
        dry_run: bool,
        /// Check file CRCs against manifest.json first
        #[arg(long)]
        verify: bool,
        /// One write per document through the write gate instead of batches
        #[arg(long)]
        single: bool,
    },
    /// Update one document from a JSON file (diff + confirmation)
    Update {
        /// <collection>/<doc-id>
        doc: Option<String>,
        /// JSON file; interactive selection from the data dir when omitted
        #[arg(long)]
        file: Option<PathBuf>,
        /// Put the file data under this top-level field
        #[arg(long)]
        path: Option<String>,
        /// replace | merge
        #[arg(long, default_value = "replace")]
        mode: String,
        /// Skip confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Delete documents (emulator only)
    Clean {
        /// Delete everything without the selection step
        #[arg(long)]
        all: bool,
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Print collection/document tree
    Tree {
        collections: Vec<String>,
    },
    /// Show documents; --watch polls and prints changes
    Doc {
        /// Full paths or bare IDs (resolved against --collection)
        docs: Vec<String>,
        #[arg(long)]
        collection: Option<String>,
        #[arg(long)]
        json: bool,
        /// Print times in UTC instead of local time
        #[arg(long)]
        utc: bool,
        #[arg(long)]
        watch: bool,
        /// On change print the whole document instead of a diff
        #[arg(long)]
        no_diff: bool,
        /// Ring the terminal bell on change
        #[arg(long)]
        beep: bool,
    },
    /// Environment diagnostics
    Doctor {
        #[arg(long)]
        json: bool,
    },
}
