//! Runtime configuration.
//!
//! Settings come from the environment (see the `ENV_*` constants) or from
//! CLI arguments, and are checked by [`Config::validate`] before any
//! component is built from them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, StitchError};
use crate::merge::pool::DEFAULT_POOL_CAPACITY;
use crate::session::manager::DEFAULT_SESSION_TTL;
use crate::store::{BlobStore, FsBlobStore, MemoryBlobStore};

/// Per-upload size limit in MB.
pub const ENV_MAX_UPLOAD_MB: &str = "MAX_UPLOAD_MB";
/// Number of bounded merge jobs running at once.
pub const ENV_POOL_CAPACITY: &str = "PDFSTITCH_POOL_CAPACITY";
/// Whether page-level merges bypass the pool.
pub const ENV_INLINE_PAGE_MERGES: &str = "PDFSTITCH_INLINE_PAGE_MERGES";
/// Idle session lifetime in seconds.
pub const ENV_SESSION_TTL_SECS: &str = "PDFSTITCH_SESSION_TTL_SECS";
/// Blob directory; blobs stay in memory when unset.
pub const ENV_STORE_DIR: &str = "PDFSTITCH_STORE_DIR";

/// Default per-upload limit in MB.
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 200;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Where blobs are kept.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StorageBackend {
    /// In-process map, lost on exit.
    #[default]
    Memory,
    /// One file per blob under a directory.
    Filesystem(PathBuf),
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: u64,

    /// Bounded merge jobs allowed to run at once.
    pub pool_capacity: usize,

    /// Run page-level merges inline instead of through the pool.
    pub inline_page_merges: bool,

    /// Sessions idle longer than this are purged.
    pub session_ttl: Duration,

    /// Blob storage backend.
    pub storage: StorageBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * BYTES_PER_MB,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            inline_page_merges: true,
            session_ttl: DEFAULT_SESSION_TTL,
            storage: StorageBackend::Memory,
        }
    }
}

impl Config {
    /// Read the configuration from the process environment.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an invalid-config error if a variable is set but malformed,
    /// or if the result fails [`Config::validate`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_MAX_UPLOAD_MB) {
            config.max_upload_bytes = parse_number::<u64>(ENV_MAX_UPLOAD_MB, &value)?
                .saturating_mul(BYTES_PER_MB);
        }
        if let Some(value) = lookup(ENV_POOL_CAPACITY) {
            config.pool_capacity = parse_number(ENV_POOL_CAPACITY, &value)?;
        }
        if let Some(value) = lookup(ENV_INLINE_PAGE_MERGES) {
            config.inline_page_merges = parse_flag(ENV_INLINE_PAGE_MERGES, &value)?;
        }
        if let Some(value) = lookup(ENV_SESSION_TTL_SECS) {
            config.session_ttl =
                Duration::from_secs(parse_number(ENV_SESSION_TTL_SECS, &value)?);
        }
        if let Some(value) = lookup(ENV_STORE_DIR)
            && !value.trim().is_empty()
        {
            config.storage = StorageBackend::Filesystem(PathBuf::from(value.trim()));
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The upload limit is zero
    /// - The pool capacity is zero
    /// - The session TTL is zero
    pub fn validate(&self) -> Result<()> {
        if self.max_upload_bytes == 0 {
            return Err(StitchError::invalid_config(
                "Upload limit must be at least 1 MB",
            ));
        }

        if self.pool_capacity == 0 {
            return Err(StitchError::invalid_config(
                "Merge pool capacity must be at least 1",
            ));
        }

        if self.session_ttl.is_zero() {
            return Err(StitchError::invalid_config(
                "Session lifetime must be at least 1 second",
            ));
        }

        Ok(())
    }

    /// Upload limit rounded down to whole MB, for messages.
    pub fn max_upload_mb(&self) -> u64 {
        self.max_upload_bytes / BYTES_PER_MB
    }

    /// Set the upload limit in MB.
    pub fn with_max_upload_mb(mut self, mb: u64) -> Self {
        self.max_upload_bytes = mb.saturating_mul(BYTES_PER_MB);
        self
    }

    /// Open the configured blob store.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the filesystem store cannot be created.
    pub async fn open_store(&self) -> Result<Arc<dyn BlobStore>> {
        match &self.storage {
            StorageBackend::Memory => Ok(Arc::new(MemoryBlobStore::new())),
            StorageBackend::Filesystem(root) => Ok(Arc::new(FsBlobStore::open(root).await?)),
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        StitchError::invalid_config(format!("{name} must be a non-negative integer, got '{value}'"))
    })
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(StitchError::invalid_config(format!(
            "{name} must be true or false, got '{value}'"
        ))),
    }
}
