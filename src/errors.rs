use crate::catalog::CatalogError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A whole discovery run accepted nothing: constraints too strict or the
    /// catalog is exhausted for them.
    #[error("Discovery yielded no acceptable items ({constraints})")]
    EmptyResult { constraints: String },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("History error: {0}")]
    History(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DiscoveryError {
    pub fn is_empty_result(&self) -> bool {
        matches!(self, DiscoveryError::EmptyResult { .. })
    }
}

impl From<sqlx::Error> for DiscoveryError {
    fn from(e: sqlx::Error) -> Self {
        DiscoveryError::Database(e.to_string())
    }
}

impl From<std::io::Error> for DiscoveryError {
    fn from(e: std::io::Error) -> Self {
        DiscoveryError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for DiscoveryError {
    fn from(e: serde_json::Error) -> Self {
        DiscoveryError::Config(format!("Serialization error: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;
