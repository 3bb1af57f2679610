//! TOML-backed construction parameters for the primitives.
//!
//! ```toml
//! [semaphore]
//! max_permits = 4
//!
//! [barrier]
//! parties = 3
//!
//! [queue]
//! capacity = 16   # omit for an unbounded queue
//! ```
//!
//! Every builder returns a fresh instance owned by the caller.

use derive_more::From;
use serde::{Deserialize, Serialize};

use crate::errors::{SyncError, SyncResult};
use crate::primitives::{Barrier, BoundedQueue, Semaphore};

#[derive(Debug, From)]
pub enum ConfigError {
    #[from(ignore)]
    IOError(std::io::Error),

    #[from(ignore)]
    DeserializationFailed(toml::de::Error),

    Invalid(SyncError),
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::DeserializationFailed(value)
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}

impl std::error::Error for ConfigError {}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemaphoreConfig {
    pub max_permits: usize,
}

impl Default for SemaphoreConfig {
    fn default() -> Self {
        Self { max_permits: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarrierConfig {
    pub parties: usize,
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self { parties: 2 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// `None` means unbounded.
    pub capacity: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub semaphore: SemaphoreConfig,
    pub barrier: BarrierConfig,
    pub queue: QueueConfig,
}

impl SyncConfig {
    /// Parses and validates a TOML document; absent sections keep their
    /// defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::DeserializationFailed`] for malformed TOML and
    /// [`ConfigError::Invalid`] for zero-sized settings.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// As [`SyncConfig::from_toml_str`], plus [`ConfigError::IOError`]
    /// when the file cannot be read.
    pub fn from_path<V: Into<std::path::PathBuf>>(target: V) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(target.into())?;
        Self::from_toml_str(&content)
    }

    /// # Errors
    ///
    /// [`SyncError::InvalidArgument`] naming the first zero setting.
    pub fn validate(&self) -> SyncResult<()> {
        if self.semaphore.max_permits == 0 {
            return Err(SyncError::InvalidArgument(
                "semaphore.max_permits must be at least 1",
            ));
        }
        if self.barrier.parties == 0 {
            return Err(SyncError::InvalidArgument("barrier.parties must be at least 1"));
        }
        if self.queue.capacity == Some(0) {
            return Err(SyncError::InvalidArgument("queue.capacity must be at least 1"));
        }
        Ok(())
    }

    /// # Errors
    ///
    /// [`SyncError::InvalidArgument`] for a zero `max_permits`.
    pub fn build_semaphore(&self) -> SyncResult<Semaphore> {
        Semaphore::new(self.semaphore.max_permits)
    }

    /// # Errors
    ///
    /// [`SyncError::InvalidArgument`] for zero `parties`.
    pub fn build_barrier(&self) -> SyncResult<Barrier> {
        Barrier::new(self.barrier.parties)
    }

    /// # Errors
    ///
    /// [`SyncError::InvalidArgument`] for a zero `capacity`.
    pub fn build_queue<T>(&self) -> SyncResult<BoundedQueue<T>> {
        match self.queue.capacity {
            Some(capacity) => BoundedQueue::new(capacity),
            None => Ok(BoundedQueue::unbounded()),
        }
    }
}
