//! HTTP request handlers for the authflow web server

pub mod error;
pub mod health;
pub mod login;
pub mod types;

pub use error::ApiError;
pub use health::*;
pub use login::*;

// Re-export all types for convenience
pub use types::*;
