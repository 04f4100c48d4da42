//! Error types for kc-client

use thiserror::Error;

/// Errors that can occur when talking to a wizard collaborator
#[derive(Error, Debug)]
pub enum ClientError {
    /// Backing document not found
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Failed to parse a YAML document
    #[error("Failed to parse document: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Failed to encode a document as JSON
    #[error("Failed to encode document: {0}")]
    Json(#[from] serde_json::Error),

    /// Document parsed but is not usable
    #[error("Invalid document: {0}")]
    Invalid(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A document with the same kind and name was already persisted
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The store refused the document
    #[error("Rejected: {0}")]
    Rejected(String),

    /// No home directory found
    #[error("Could not determine home directory")]
    NoHomeDirectory,
}
