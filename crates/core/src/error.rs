//! Error types for periodica
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use crate::unit::TemporalUnit;
use std::io;
use thiserror::Error;

/// Result type alias for periodica operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for periodica
#[derive(Debug, Error)]
pub enum Error {
    /// Period factor must be strictly positive
    #[error("Invalid period factor: {0} (must be > 0)")]
    InvalidFactor(u64),

    /// Unit has no period or truncation semantics
    #[error("Unsupported temporal unit: {0}")]
    UnsupportedUnit(TemporalUnit),

    /// Timezone identifier could not be parsed
    #[error("Invalid timezone: {0}")]
    InvalidZone(String),

    /// Date/time arithmetic left the representable range
    #[error("Temporal overflow: {0}")]
    Overflow(String),

    /// Snapshot read could not be served consistently
    #[error("Snapshot aborted: {0}")]
    Aborted(String),

    /// Field is reserved by another writer
    #[error("Field {0} is reserved for exclusive access")]
    FieldReserved(String),

    /// Lease does not match the current reservation
    #[error("Invalid lease for field {0}")]
    InvalidLease(String),

    /// Value kind does not match the field
    #[error("Type mismatch for field {field}: expected {expected}")]
    TypeMismatch {
        /// Field being written
        field: String,
        /// Expected value kind
        expected: &'static str,
    },

    /// Configuration resource has been deleted
    #[error("Configuration resource deleted")]
    Deleted,

    /// Operation on a destroyed timer
    #[error("Timer used after destroy")]
    UseAfterDestroy,

    /// Operation is not supported by this object
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Configuration file could not be parsed or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error (config file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns true for transient conditions that are retried on the next trigger.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Aborted(_))
    }

    /// Returns true for errors that need the configuration to be corrected.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidFactor(_)
                | Error::UnsupportedUnit(_)
                | Error::InvalidZone(_)
                | Error::Config(_)
        )
    }
}
