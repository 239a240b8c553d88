use thiserror::Error;

/// Unified error type for the entire Fireflow library
#[derive(Debug, Error)]
pub enum FireflowError {
    /// Workflow construction/topology errors
    #[error("Workflow error: {message}")]
    Workflow {
        message: String,
        workflow: Option<String>,
    },

    /// Validation errors (cycles, dangling links, bad specs)
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Retrieval was dispatched against a graph built by a different builder
    #[error("Workflow kind mismatch: expected {expected}, found {found}")]
    WorkflowMismatch { expected: String, found: String },

    /// A required container/result could not be located in the graph
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// Launch bookkeeping errors (no launches recorded, missing run dir)
    #[error("Launch error: {message}")]
    Launch { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// IO errors
    #[error("IO operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization errors
    #[error("Serialization failed: {format}")]
    Serialization {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Explicitly unimplemented operations
    #[error("Not implemented: {operation}")]
    NotImplemented { operation: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl FireflowError {
    /// Create a workflow error
    pub fn workflow<S: Into<String>>(message: S) -> Self {
        Self::Workflow {
            message: message.into(),
            workflow: None,
        }
    }

    /// Create a workflow error tagged with the workflow name
    pub fn workflow_named<S: Into<String>, N: Into<String>>(message: S, workflow: N) -> Self {
        Self::Workflow {
            message: message.into(),
            workflow: Some(workflow.into()),
        }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a validation error with field
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a workflow-kind mismatch error
    pub fn mismatch<E: Into<String>, F: Into<String>>(expected: E, found: F) -> Self {
        Self::WorkflowMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a launch error
    pub fn launch<S: Into<String>>(message: S) -> Self {
        Self::Launch {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
            field: None,
        }
    }

    /// Create an IO error
    pub fn io<S: Into<String>>(operation: S, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        format: S,
        source: E,
    ) -> Self {
        Self::Serialization {
            format: format.into(),
            source: Box::new(source),
        }
    }

    /// Create a not-implemented error
    pub fn not_implemented<S: Into<String>>(operation: S) -> Self {
        Self::NotImplemented {
            operation: operation.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Get error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Workflow { .. } => "workflow",
            Self::Validation { .. } => "validation",
            Self::WorkflowMismatch { .. } => "mismatch",
            Self::NotFound { .. } => "not_found",
            Self::Launch { .. } => "launch",
            Self::Configuration { .. } => "configuration",
            Self::Io { .. } => "io",
            Self::Serialization { .. } => "serialization",
            Self::NotImplemented { .. } => "not_implemented",
            Self::Internal { .. } => "internal",
        }
    }

}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, FireflowError>;

/// Convert from common error types
impl From<std::io::Error> for FireflowError {
    fn from(err: std::io::Error) -> Self {
        Self::io("io_operation", err)
    }
}

impl From<serde_json::Error> for FireflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization("json", err)
    }
}

impl From<serde_yaml::Error> for FireflowError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::serialization("yaml", err)
    }
}

impl From<anyhow::Error> for FireflowError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}
