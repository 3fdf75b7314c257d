//! Centralized configuration for the CLI and library pipelines.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - ToolConfig::from_env() reads the environment once; fluent `with_*` setters override.
//! - The Converter is derived from config and passed explicitly into every pipeline
//!   (no process-wide "current converter").
//!
//! Connection-related variables (emulator host, project, credentials) belong to the
//! store client; the tool only reads them for `doctor` and the emulator guard of `clean`.

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::converter::{Converter, TimestampEncoding};
use crate::store::MAX_BATCH_OPS;
use crate::util::{env_flag, env_trimmed};

pub const ENV_EMULATOR_HOST: &str = "FIRESTORE_EMULATOR_HOST";
pub const ENV_PROJECT: &str = "GCLOUD_PROJECT";
pub const ENV_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const ENV_LOCAL_STORE: &str = "FIRESTORE_LOCAL_STORE";
pub const ENV_DATA_DIR: &str = "FIRESTORE_DATA_DIR";
pub const ENV_BATCH_SIZE: &str = "FIRESTORE_BATCH_SIZE";
pub const ENV_WRITE_CONCURRENCY: &str = "FIRESTORE_WRITE_CONCURRENCY";
pub const ENV_TYPED_TIMESTAMPS: &str = "FIRESTORE_TYPED_TIMESTAMPS";
pub const ENV_WATCH_INTERVAL_MS: &str = "FIRESTORE_WATCH_INTERVAL_MS";

pub const DEFAULT_LOCAL_STORE: &str = ".firestore-local";

#[derive(Clone, Debug, PartialEq)]
pub struct ToolConfig {
    /// Env: FIRESTORE_EMULATOR_HOST. `clean` refuses to run without it.
    pub emulator_host: Option<String>,

    /// Env: GCLOUD_PROJECT
    pub project_id: Option<String>,

    /// Env: GOOGLE_APPLICATION_CREDENTIALS
    pub credentials: Option<String>,

    /// Directory of the local store backend.
    /// Env: FIRESTORE_LOCAL_STORE (default ".firestore-local")
    pub store_dir: PathBuf,

    /// Working directory holding snapshot folders and update files.
    /// Env: FIRESTORE_DATA_DIR (default: current directory)
    pub data_dir: PathBuf,

    /// Documents per atomic batch, 1..=500.
    /// Env: FIRESTORE_BATCH_SIZE (default 500)
    pub batch_size: usize,

    /// Max in-flight single writes for the gated write mode.
    /// Env: FIRESTORE_WRITE_CONCURRENCY (default 1)
    pub write_concurrency: usize,

    /// Write timestamps as typed envelopes instead of ISO strings.
    /// Env: FIRESTORE_TYPED_TIMESTAMPS = 0|1|true|false (default false)
    pub typed_timestamps: bool,

    /// Poll interval of `doc --watch`.
    /// Env: FIRESTORE_WATCH_INTERVAL_MS (default 1000)
    pub watch_interval_ms: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            emulator_host: None,
            project_id: None,
            credentials: None,
            store_dir: PathBuf::from(DEFAULT_LOCAL_STORE),
            data_dir: PathBuf::from("."),
            batch_size: MAX_BATCH_OPS,
            write_concurrency: 1,
            typed_timestamps: false,
            watch_interval_ms: 1000,
        }
    }
}

impl ToolConfig {
    /// Load configuration from environment variables. Unparsable numbers keep defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        cfg.emulator_host = env_trimmed(ENV_EMULATOR_HOST);
        cfg.project_id = env_trimmed(ENV_PROJECT);
        cfg.credentials = env_trimmed(ENV_CREDENTIALS);

        if let Some(v) = env_trimmed(ENV_LOCAL_STORE) {
            cfg.store_dir = PathBuf::from(v);
        }
        if let Some(v) = env_trimmed(ENV_DATA_DIR) {
            cfg.data_dir = PathBuf::from(v);
        }
        if let Some(n) = env_trimmed(ENV_BATCH_SIZE).and_then(|v| v.parse::<usize>().ok()) {
            cfg.batch_size = n;
        }
        if let Some(n) = env_trimmed(ENV_WRITE_CONCURRENCY).and_then(|v| v.parse::<usize>().ok())
        {
            cfg.write_concurrency = n;
        }
        if let Some(on) = env_flag(ENV_TYPED_TIMESTAMPS) {
            cfg.typed_timestamps = on;
        }
        if let Some(n) = env_trimmed(ENV_WATCH_INTERVAL_MS).and_then(|v| v.parse::<u64>().ok()) {
            cfg.watch_interval_ms = n;
        }

        cfg
    }

    pub fn with_emulator_host<S: Into<String>>(mut self, host: Option<S>) -> Self {
        self.emulator_host = host.map(Into::into);
        self
    }

    pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store_dir = dir.into();
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn with_write_concurrency(mut self, n: usize) -> Self {
        self.write_concurrency = n;
        self
    }

    pub fn with_typed_timestamps(mut self, on: bool) -> Self {
        self.typed_timestamps = on;
        self
    }

    pub fn with_watch_interval_ms(mut self, ms: u64) -> Self {
        self.watch_interval_ms = ms;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_OPS {
            bail!(
                "{} must be between 1 and {} (got {})",
                ENV_BATCH_SIZE,
                MAX_BATCH_OPS,
                self.batch_size
            );
        }
        if self.write_concurrency == 0 {
            bail!("{} must be at least 1", ENV_WRITE_CONCURRENCY);
        }
        if self.watch_interval_ms == 0 {
            bail!("{} must be at least 1", ENV_WATCH_INTERVAL_MS);
        }
        Ok(())
    }

    pub fn is_emulator(&self) -> bool {
        self.emulator_host.is_some()
    }

    /// Converter for snapshot files and update payloads.
    pub fn converter(&self) -> Converter {
        let encoding = if self.typed_timestamps {
            TimestampEncoding::Envelope
        } else {
            TimestampEncoding::IsoString
        };
        Converter::new(encoding, true)
    }
}
