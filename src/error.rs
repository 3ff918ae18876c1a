//! Error types for the people cache service

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the people cache service
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // =========================================================================
    // Key-Value Store Errors
    // =========================================================================
    /// A key-value region could not be reached
    #[error("Key-value region '{region}' unavailable: {reason}")]
    StoreUnavailable { region: String, reason: String },

    /// A key-value command failed
    #[error("Key-value store error: {0}")]
    Store(String),

    /// Redis client error
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The control flag holds something other than "1" or "2"
    #[error("Invalid active buffer flag: {0:?}")]
    InvalidBufferFlag(String),

    // =========================================================================
    // Codec Errors
    // =========================================================================
    /// A record could not be encoded or decoded
    #[error("Failed to {operation} person record: {reason}")]
    Codec {
        operation: &'static str,
        reason: String,
    },

    // =========================================================================
    // Record Store Errors
    // =========================================================================
    /// The authoritative record store failed
    #[error("Record store error: {0}")]
    RecordStore(String),

    /// Seed data could not be parsed
    #[error("Failed to parse seed data: {0}")]
    SeedParse(String),

    // =========================================================================
    // Refresh Errors
    // =========================================================================
    /// Another refresh run holds the single-flight guard
    #[error("Cache refresh already in progress")]
    RefreshInProgress,

    /// Population did not finish within the configured bound
    #[error("Cache refresh timed out after {duration}")]
    RefreshTimeout { duration: String },

    /// A single batch could not be written
    #[error("Batch {batch} failed: {reason}")]
    BatchFailed { batch: usize, reason: String },

    /// One or more batches failed; the swap was skipped
    #[error("Population failed for {failed} of {total} batches: {reason}")]
    PopulationFailed {
        failed: usize,
        total: usize,
        reason: String,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid cron expression
    #[error("Invalid refresh schedule '{expression}': {reason}")]
    Schedule { expression: String, reason: String },

    /// Duration parse error
    #[error("Failed to parse duration: {0}")]
    DurationParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error originated in the cache's key-value layer.
    pub fn is_store_error(&self) -> bool {
        match self {
            Error::StoreUnavailable { .. } | Error::Store(_) | Error::InvalidBufferFlag(_) => true,
            #[cfg(feature = "redis")]
            Error::Redis(_) => true,
            _ => false,
        }
    }
}
