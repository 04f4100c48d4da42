//! Error types for the wizard engine

use kc_client::ClientError;
use thiserror::Error;

/// A single field failed validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// The finished state could not be turned into a document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    /// An enabled addon has no entry in the component catalog
    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    /// A derived value the document needs was never resolved
    #[error("Missing context: {0}")]
    MissingContext(String),
}

/// Errors surfaced by the wizard
#[derive(Error, Debug)]
pub enum WizardError {
    /// Version matrix could not be loaded; retry by loading again
    #[error("Version catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// One or more fields of the current step are invalid
    #[error("{} field(s) failed validation", .0.len())]
    Invalid(Vec<ValidationError>),

    /// Field key not defined by this flow
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Edit addressed to a step other than the one being edited
    #[error("Step {step} is not active (editing step {current})")]
    StepNotActive { step: usize, current: usize },

    /// Already on the last step
    #[error("Already on the last step")]
    AtLastStep,

    /// Submit called before reaching the last step
    #[error("Cannot submit from step {0}")]
    NotReady(usize),

    /// Wizard was completed or cancelled
    #[error("Wizard is closed")]
    Closed,

    /// Stored template does not match the catalog
    #[error("Invalid template: {0}")]
    Template(String),

    /// Assembly failed; nothing was submitted
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    /// Persistence collaborator refused the document
    #[error("Submission failed: {0}")]
    Submission(ClientError),

    /// Invalid wizard configuration
    #[error("Invalid config: {0}")]
    Config(#[from] serde_yaml::Error),
}

impl WizardError {
    /// Per-field errors, when this is a validation failure
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            WizardError::Invalid(errors) => errors,
            _ => &[],
        }
    }
}
