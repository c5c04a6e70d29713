//! HTTP API server

pub mod keepalive;
pub mod routes;
pub mod server;

pub use server::*;
