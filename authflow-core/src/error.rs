//! Unified error handling
//!
//! Structured error types carrying context and recovery suggestions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

pub type AuthflowResult<T> = Result<T, AuthflowError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Main error type shared by the authflow crates
#[derive(Error, Debug)]
pub enum AuthflowError {
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },
}

impl AuthflowError {
    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            AuthflowError::Config { context, .. } | AuthflowError::Validation { context, .. } => {
                context
            }
        }
    }

    /// Log the error together with its id and recovery suggestions
    pub fn log(&self) {
        let context = self.context();
        match self {
            AuthflowError::Config { .. } => {
                error!(
                    error_id = %context.error_id,
                    operation = ?context.operation,
                    suggestions = ?context.recovery_suggestions,
                    error = %self,
                    "Configuration error"
                );
            }
            AuthflowError::Validation { field, .. } => {
                error!(
                    error_id = %context.error_id,
                    field = ?field,
                    suggestions = ?context.recovery_suggestions,
                    error = %self,
                    "Validation error"
                );
            }
        }
    }
}
