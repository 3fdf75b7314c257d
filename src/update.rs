//! update: частичное обновление одного документа из JSON-файла.
//!
//! Поток: parse_doc_arg → load_patch → (wrap_at_path) → prepare_update (diff
//! текущего и итогового документа) → подтверждение в CLI → apply_update
//! (run_transaction + set(merge = mode == merge)).

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::converter::Converter;
use crate::diff::{diff_documents, FieldChange};
use crate::metrics::record_single_write;
use crate::snapdir::{read_doc_file, scan_files, DOC_EXT};
use crate::store::{validate_doc_path, DocumentStore, SetOptions};
use crate::value::{merge_fields, Document, StoreValue};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpdateMode {
    #[default]
    Replace,
    Merge,
}

impl UpdateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateMode::Replace => "replace",
            UpdateMode::Merge => "merge",
        }
    }

    pub fn set_options(&self) -> SetOptions {
        match self {
            UpdateMode::Replace => SetOptions::replace(),
            UpdateMode::Merge => SetOptions::merge(),
        }
    }
}

impl FromStr for UpdateMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(UpdateMode::Replace),
            "merge" => Ok(UpdateMode::Merge),
            other => Err(anyhow!(
                "invalid mode '{}': expected 'replace' or 'merge'",
                other
            )),
        }
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `<collection>/<doc-id>` из аргумента командной строки.
pub fn parse_doc_arg(arg: &str) -> Result<String> {
    let path = arg.trim();
    if path.is_empty() {
        bail!("document is required: <collection>/<doc-id>");
    }
    if !path.contains('/') {
        bail!(
            "invalid document '{}': must be in format <collection>/<doc-id>",
            path
        );
    }
    validate_doc_path(path)?;
    Ok(path.to_string())
}

/// JSON-файлы в `dir`, кандидаты для интерактивного выбора.
pub fn list_update_files(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    scan_files(dir, DOC_EXT)
}

/// Обычно `Converter::raw()`: строки вида "2...Z" остаются строками.
pub fn load_patch(file: &Path, converter: &Converter) -> Result<Document> {
    if !file.is_file() {
        bail!("file not found: {}", file.display());
    }
    read_doc_file(file, converter)
}

/// `--path P`: данные уходят под одно поле верхнего уровня с буквальным именем `P`.
pub fn wrap_at_path(data: Document, field: Option<&str>) -> Document {
    match field.map(str::trim).filter(|f| !f.is_empty()) {
        Some(f) => {
            let mut out = Document::new();
            out.insert(f.to_string(), StoreValue::Map(data));
            out
        }
        None => data,
    }
}

/// Каким станет документ после записи `patch` в режиме `mode`.
pub fn resulting_document(current: Option<&Document>, patch: &Document, mode: UpdateMode) -> Document {
    match (mode, current) {
        (UpdateMode::Merge, Some(cur)) => {
            let mut out = cur.clone();
            merge_fields(&mut out, patch.clone());
            out
        }
        _ => patch.clone(),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdatePlan {
    pub path: String,
    pub mode: UpdateMode,
    pub patch: Document,
    pub current: Option<Document>,
    pub result: Document,
    pub changes: Vec<FieldChange>,
}

impl UpdatePlan {
    pub fn is_noop(&self) -> bool {
        self.current.is_some() && self.changes.is_empty()
    }
}

/// Прочитать текущий документ и посчитать diff; в стор ничего не пишется.
pub fn prepare_update(
    store: &dyn DocumentStore,
    path: &str,
    patch: Document,
    mode: UpdateMode,
) -> Result<UpdatePlan> {
    validate_doc_path(path)?;
    let current = store
        .get(path)
        .with_context(|| format!("read current document {}", path))?
        .data;
    let result = resulting_document(current.as_ref(), &patch, mode);
    let changes = diff_documents(current.as_ref(), Some(&result));
    debug!("update {}: {} field change(s) ({})", path, changes.len(), mode);
    Ok(UpdatePlan {
        path: path.to_string(),
        mode,
        patch,
        current,
        result,
        changes,
    })
}

pub fn apply_update(store: &dyn DocumentStore, plan: &UpdatePlan) -> Result<()> {
    let opts = plan.mode.set_options();
    let res = store.run_transaction(&mut |txn| txn.set(&plan.path, plan.patch.clone(), opts));
    record_single_write(res.is_ok());
    res.with_context(|| format!("update {} ({})", plan.path, plan.mode))?;
    info!("updated {} ({})", plan.path, plan.mode);
    Ok(())
}
