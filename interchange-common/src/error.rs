//! Error types for the interchange-atlas toolkit
//!
//! Every variant is fatal for the run that raised it. Conditions that only
//! leave an optional field empty (no weigh station nearby, no external match)
//! are not errors and never reach this type.

use thiserror::Error;

/// Main error type for interchange-atlas operations
#[derive(Debug, Error)]
pub enum Error {
    /// Raw input that cannot be turned into segments or ramps
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// A route whose ways cannot be put into a single linear order
    #[error("Ambiguous ordering for route '{route}': {reason}")]
    AmbiguousRouteOrdering { route: String, reason: String },

    /// An interchange candidate without any node to bound
    #[error("No bounds computable: {0}")]
    NoBoundsComputable(String),

    /// Audited data convention that no longer holds (e.g. master with three routes)
    #[error("Structural assumption violated: {0}")]
    StructuralAssumption(String),

    /// Pipeline configuration rejected during validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for [`Error::AmbiguousRouteOrdering`]
    pub fn ambiguous(route: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::AmbiguousRouteOrdering {
            route: route.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience result type for interchange-atlas operations
pub type Result<T> = std::result::Result<T, Error>;
