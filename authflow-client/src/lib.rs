//! Authflow Client - caller side of the login session protocol
//!
//! [`SessionClient`] drives one server-held login session at a time over a
//! [`LoginApi`] transport. [`HttpLoginApi`] is the reqwest implementation.

pub mod client;
pub mod error;
pub mod transport;

pub use client::{SessionClient, SessionContext};
pub use error::{ClientError, ClientResult};
pub use transport::{
    create_http_client, ClientConfig, HttpLoginApi, LoginApi, ReloadReply, StartReply,
};
