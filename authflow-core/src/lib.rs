//! Authflow Core - shared data structures for the login session protocol
//!
//! Holds the session state vocabulary, the unified error type, configuration
//! loading and logging setup used by every other authflow crate.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use tracing;
