use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, MultiSelect, Select};
use log::debug;

use firestore_cli::converter::format_timestamp;
use firestore_cli::diff::{ChangeKind, FieldChange};
use firestore_cli::{Converter, DocSnapshot, DocTree, LocalStore, ToolConfig};

pub fn open_store(cfg: &ToolConfig) -> Result<LocalStore> {
    let store = LocalStore::open(&cfg.store_dir)?;
    debug!("store: {}", cfg.store_dir.display());
    Ok(store)
}

/// Информационное сообщение (пустой результат и т.п.), не ошибка.
pub fn notice(msg: &str) {
    println!("{}", style(msg).yellow());
}

/// `yes` пропускает вопрос.
pub fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    let ok = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?;
    Ok(ok)
}

/// None: пользователь отменил выбор (Esc / q).
pub fn pick_one(prompt: &str, items: &[String]) -> Result<Option<usize>> {
    let picked = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(items)
        .default(0)
        .interact_opt()?;
    Ok(picked)
}

pub fn pick_many(prompt: &str, items: &[String]) -> Result<Vec<usize>> {
    let picked = MultiSelect::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(items)
        .interact_opt()?;
    Ok(picked.unwrap_or_default())
}

pub fn print_tree(tree: &DocTree) {
    for (collection, ids) in tree.collections() {
        println!("{}", style(format!("{}/", collection)).cyan().bold());
        for id in ids.keys() {
            println!("  └─ {}", id);
        }
    }
}

pub fn print_change(change: &FieldChange, converter: &Converter) {
    let line = change.describe(converter);
    match change.kind {
        ChangeKind::Added => println!("  {}", style(line).green()),
        ChangeKind::Removed => println!("  {}", style(line).red()),
        ChangeKind::Modified => println!("  {}", style(line).yellow()),
    }
}

pub fn format_time(ts: Option<DateTime<Utc>>, utc: bool) -> String {
    match ts {
        None => "-".to_string(),
        Some(t) if utc => format_timestamp(&t),
        Some(t) => t
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S%.3f %:z")
            .to_string(),
    }
}

pub fn doc_to_json(snap: &DocSnapshot, converter: &Converter, utc: bool) -> serde_json::Value {
    serde_json::json!({
        "path": snap.path,
        "exists": snap.exists(),
        "create_time": snap.create_time.map(|t| format_time(Some(t), utc)),
        "update_time": snap.update_time.map(|t| format_time(Some(t), utc)),
        "data": snap.data.as_ref().map(|d| serde_json::Value::Object(converter.to_portable(d))),
    })
}

pub fn print_doc(snap: &DocSnapshot, converter: &Converter, json: bool, utc: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(&doc_to_json(snap, converter, utc))?);
        return Ok(());
    }
    println!("{}", style(&snap.path).cyan().bold());
    println!("  exists:  {}", snap.exists());
    println!("  created: {}", format_time(snap.create_time, utc));
    println!("  updated: {}", format_time(snap.update_time, utc));
    if let Some(d) = &snap.data {
        let body = serde_json::to_string_pretty(&serde_json::Value::Object(converter.to_portable(d)))?;
        println!("  data:");
        for line in body.lines() {
            println!("    {}", line);
        }
    }
    Ok(())
}
