//! Schoolhouse - school administration backend
//!
//! Library interface for the HTTP API, the storage layer and the CLI, so
//! integration tests and tools can drive the server in process.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod models;

pub use config::Config;
pub use error::Error;
