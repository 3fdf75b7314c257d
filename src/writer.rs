//! writer: запись списков DocItem в стор.
//!
//! Batched (основной режим):
//! - вход режется на чанки по `batch_size` (≤ MAX_BATCH_OPS = 500);
//! - на чанк: один WriteBatch: set (full replace) на каждый item по полному пути, затем commit;
//! - чанки строго последовательно, после каждого коммита: накопительный прогресс;
//! - ошибка коммита прерывает запись сразу. Уже закоммиченные чанки остаются
//!   (нет кросс-чанкового отката); сколько успело записаться: видно в тексте ошибки.
//!
//! Gated (одиночные записи):
//! - по одному set на документ, не более `limit` записей одновременно (WriteGate);
//! - at-most-once на item, без ретраев; упавшая запись не отменяет уже выпущенные,
//!   остальные item'ы продолжают выпускаться. Итог: SingleWriteReport.

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info, warn};
use std::sync::{Condvar, Mutex};

use crate::metrics::{record_batch_committed, record_single_write};
use crate::snapshot::DocItem;
use crate::store::{DocumentStore, SetOptions, WriteBatch, MAX_BATCH_OPS};
use crate::util::lock;

/// Прогресс после каждого закоммиченного чанка.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteProgress {
    /// 1-based номер чанка.
    pub chunk: usize,
    pub chunk_len: usize,
    /// Накопительно записано.
    pub written: usize,
    pub total: usize,
}

pub fn validate_batch_size(batch_size: usize) -> Result<()> {
    if batch_size == 0 {
        bail!("batch size must be at least 1");
    }
    if batch_size > MAX_BATCH_OPS {
        bail!(
            "batch size {} exceeds the store limit of {} operations",
            batch_size,
            MAX_BATCH_OPS
        );
    }
    Ok(())
}

/// Размеры чанков для `total` записей (для dry-run и отчётов).
pub fn plan_chunks(total: usize, batch_size: usize) -> Vec<usize> {
    if batch_size == 0 {
        return Vec::new();
    }
    (0..total)
        .step_by(batch_size)
        .map(|start| batch_size.min(total - start))
        .collect()
}

pub struct BatchWriter<'a> {
    store: &'a dyn DocumentStore,
    batch_size: usize,
}

impl<'a> BatchWriter<'a> {
    pub fn new(store: &'a dyn DocumentStore, batch_size: usize) -> Result<Self> {
        validate_batch_size(batch_size)?;
        Ok(Self { store, batch_size })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Записать все items; возвращает общее число записанных.
    pub fn write_all(
        &self,
        items: Vec<DocItem>,
        progress: &mut dyn FnMut(WriteProgress),
    ) -> Result<usize> {
        let total = items.len();
        if total == 0 {
            debug!("batch writer: nothing to write");
            return Ok(0);
        }
        let mut written = 0usize;
        let mut items = items.into_iter();
        let mut chunk_no = 0usize;

        loop {
            let mut batch = WriteBatch::new();
            for item in items.by_ref().take(self.batch_size) {
                batch.set(item.path, item.data);
            }
            if batch.is_empty() {
                break;
            }
            chunk_no += 1;
            let chunk_len = batch.len();

            self.store.commit(batch).with_context(|| {
                format!(
                    "commit batch #{} ({} document(s)); {} of {} document(s) were committed before the failure",
                    chunk_no, chunk_len, written, total
                )
            })?;

            written += chunk_len;
            record_batch_committed(chunk_len);
            debug!(
                "batch writer: chunk #{} committed ({} docs, {}/{})",
                chunk_no, chunk_len, written, total
            );
            progress(WriteProgress {
                chunk: chunk_no,
                chunk_len,
                written,
                total,
            });
        }

        info!("batch writer: {} document(s) in {} batch(es)", written, chunk_no);
        Ok(written)
    }
}

/// Удобная обёртка без прогресса.
pub fn write_batched(
    store: &dyn DocumentStore,
    items: Vec<DocItem>,
    batch_size: usize,
) -> Result<usize> {
    BatchWriter::new(store, batch_size)?.write_all(items, &mut |_| {})
}

// ---------------- gated single writes ----------------

/// Ограничитель одновременных записей (counting semaphore).
pub struct WriteGate {
    limit: usize,
    in_flight: Mutex<usize>,
    cv: Condvar,
}

/// RAII-разрешение; освобождает слот на Drop.
pub struct GatePermit<'g> {
    gate: &'g WriteGate,
}

impl WriteGate {
    pub fn new(limit: usize) -> Result<Self> {
        if limit == 0 {
            bail!("write concurrency must be at least 1");
        }
        Ok(Self {
            limit,
            in_flight: Mutex::new(0),
            cv: Condvar::new(),
        })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).map(|n| *n).unwrap_or(0)
    }

    /// Блокируется, пока занято `limit` слотов.
    pub fn acquire(&self) -> Result<GatePermit<'_>> {
        let mut n = lock(&self.in_flight)?;
        while *n >= self.limit {
            n = self
                .cv
                .wait(n)
                .map_err(|_| anyhow!("write gate poisoned"))?;
        }
        *n += 1;
        Ok(GatePermit { gate: self })
    }
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        if let Ok(mut n) = self.gate.in_flight.lock() {
            *n = n.saturating_sub(1);
        }
        self.gate.cv.notify_one();
    }
}

/// Итог gated-записи. Пути в порядке входа.
#[derive(Debug, Default)]
pub struct SingleWriteReport {
    pub written: Vec<String>,
    pub failed: Vec<(String, anyhow::Error)>,
}

impl SingleWriteReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.written.len() + self.failed.len()
    }
}

/// Одиночные записи (full replace) через WriteGate с лимитом `limit`.
pub fn write_gated(
    store: &dyn DocumentStore,
    items: Vec<DocItem>,
    limit: usize,
) -> Result<SingleWriteReport> {
    let gate = WriteGate::new(limit)?;
    let total = items.len();
    let results: Mutex<Vec<(usize, String, Result<()>)>> = Mutex::new(Vec::with_capacity(total));

    std::thread::scope(|s| -> Result<()> {
        for (idx, item) in items.into_iter().enumerate() {
            let permit = gate.acquire()?;
            let results = &results;
            s.spawn(move || {
                let _permit = permit;
                let res = store.set(&item.path, item.data, SetOptions::replace());
                record_single_write(res.is_ok());
                match &res {
                    Ok(()) => debug!("single write: {} ok", item.path),
                    Err(e) => warn!("single write: {} failed: {:#}", item.path, e),
                }
                if let Ok(mut r) = results.lock() {
                    r.push((idx, item.path, res));
                }
            });
        }
        Ok(())
    })?;

    let mut results = results
        .into_inner()
        .map_err(|_| anyhow!("write results poisoned"))?;
    results.sort_by_key(|(idx, _, _)| *idx);

    let mut report = SingleWriteReport::default();
    for (_, path, res) in results {
        match res {
            Ok(()) => report.written.push(path),
            Err(e) => report.failed.push((path, e)),
        }
    }
    info!(
        "single writes: {} written, {} failed (limit {})",
        report.written.len(),
        report.failed.len(),
        limit
    );
    Ok(report)
}
