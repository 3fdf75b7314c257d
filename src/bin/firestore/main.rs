use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::LevelFilter;

use firestore_cli::ToolConfig;

mod cli;
mod util;
mod cmd_dump;
mod cmd_restore;
mod cmd_update;
mod cmd_clean;
mod cmd_tree;
mod cmd_doc;
mod cmd_doctor;

fn init_logger(debug: bool) {
    // Уровень берём из RUST_LOG, иначе дефолт: info. --debug перекрывает.
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    if debug {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.format_timestamp_millis().init();
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    init_logger(cli.debug);

    let cfg = ToolConfig::from_env();
    cfg.validate()?;

    match cli.cmd {
        cli::Cmd::Dump { name, only, except } =>
            cmd_dump::exec(&cfg, name, only, except),

        cli::Cmd::Restore { snapshot, only, except, dump, dry_run, verify, single } =>
            cmd_restore::exec(&cfg, snapshot, only, except, dump, dry_run, verify, single),

        cli::Cmd::Update { doc, file, path, mode, yes } =>
            cmd_update::exec(&cfg, doc, file, path, mode, yes),

        // Только эмулятор
        cli::Cmd::Clean { all, yes } =>
            cmd_clean::exec(&cfg, all, yes),

        cli::Cmd::Tree { collections } =>
            cmd_tree::exec(&cfg, collections),

        cli::Cmd::Doc { docs, collection, json, utc, watch, no_diff, beep } =>
            cmd_doc::exec(&cfg, docs, collection, json, utc, watch, no_diff, beep),

        cli::Cmd::Doctor { json } =>
            cmd_doctor::exec(&cfg, json),
    }
}
