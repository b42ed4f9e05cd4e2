//! Error types for the `hush` core library.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the core `Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors. Storage and crypto failures have their own types.
#[derive(Debug, Error)]
pub enum Error {
    /// A value that parsed but is not acceptable.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file {}: {source}", path.display())]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
