// Error handling module
// Defines the fatal error taxonomy: configuration, schema and report errors.
// Connection-level faults never surface here; workers absorb them.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while validating command line / environment configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Neither --endpoint-url nor --dir was supplied
    #[error("One of --endpoint-url or --dir must be provided")]
    MissingDestination,

    /// Both --endpoint-url and --dir were supplied
    #[error("Only one of --endpoint-url or --dir may be provided")]
    ConflictingDestination,

    /// Directory output is accepted on the command line but not implemented
    #[error("Directory output is not implemented: {0}")]
    DirectoryModeUnsupported(PathBuf),

    /// Endpoint URL could not be parsed
    #[error("Invalid endpoint URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Client count must be at least one
    #[error("Client count must be at least 1, got {0}")]
    InvalidClientCount(usize),

    /// Percentage option outside [0, 100]
    #[error("{name} must be within [0, 100], got {value}")]
    InvalidRate { name: &'static str, value: f64 },

    /// Negative or non-finite frequency
    #[error("Frequency must be a non-negative number, got {0}")]
    InvalidFrequency(f64),

    /// Negative or non-finite run timeout
    #[error("Timeout must be a non-negative number of seconds, got {0}")]
    InvalidTimeout(f64),
}

/// Errors raised while loading or compiling a schema document
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Schema file does not exist
    #[error("Schema file not found at path: {}", path.display())]
    NotFound { path: PathBuf },

    /// Schema file exists but is not valid JSON
    #[error("File at path: {} contains invalid JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Any other I/O failure while reading the schema file
    #[error("Failed to read schema file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Schema keyword has the wrong shape
    #[error("Invalid schema at {path}: {reason}")]
    Structure { path: String, reason: String },

    /// `$ref` does not point anywhere inside the document
    #[error("Unresolved reference '{reference}' at {path}")]
    UnresolvedRef { path: String, reference: String },
}

impl SchemaError {
    pub(crate) fn structure(path: &str, reason: impl Into<String>) -> Self {
        SchemaError::Structure {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Degenerate inputs that make a performance report meaningless
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReportError {
    #[error("No requests were sent")]
    NoRequests,

    #[error("Elapsed time is zero")]
    ZeroElapsed,

    #[error("Client count is zero")]
    NoClients,
}
