//! Core library for the Wi-Fi RSSI survey station.
//! This crate defines the backend trait (the seam over whatever actually
//! drives the radio), the fixed-capacity survey table, and the TCP command
//! server a collector peer talks to.

pub mod backends;
pub mod command_server;
pub mod config;
pub mod rtt;
pub mod scan;
pub mod traits;

// Shared Error and Result type for the entire crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// A specialized `Result` type for this crate's operations.
pub type Result<T> = std::result::Result<T, Error>;
