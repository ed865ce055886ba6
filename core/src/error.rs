use std::{error::Error, fmt, result};

pub type Result<T, E = StockroomError> = result::Result<T, E>;

#[derive(Debug)]
pub enum StockroomError {
    Internal(String),
    DbError(String),
    SerDe(String),
    /// Invalid static configuration (catalogue, namespace table). Fatal at startup.
    Configuration(String),
    /// Adjacency data violates the tree invariants (cycle, dangling parent, too deep).
    MalformedHierarchy(String),
    NotFound(String),
    CacheUnavailable(String),
    InvalidRequest(String),
}

impl Error for StockroomError {}

impl fmt::Display for StockroomError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StockroomError::Internal(s) => write!(f, "Unexpected internal error: {}", s),
            StockroomError::DbError(s) => write!(f, "Database related error: {}", s),
            StockroomError::SerDe(s) => write!(f, "SerDe related error: {}", s),
            StockroomError::Configuration(s) => write!(f, "Invalid configuration: {}", s),
            StockroomError::MalformedHierarchy(s) => write!(f, "Malformed hierarchy: {}", s),
            StockroomError::NotFound(s) => write!(f, "Not found: {}", s),
            StockroomError::CacheUnavailable(s) => write!(f, "Tree cache unavailable: {}", s),
            StockroomError::InvalidRequest(s) => write!(f, "invalid request: {}", s),
        }
    }
}

impl From<diesel::result::Error> for StockroomError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::NotFound => StockroomError::NotFound(e.to_string()),
            _ => StockroomError::DbError(e.to_string()),
        }
    }
}

impl From<diesel::result::ConnectionError> for StockroomError {
    fn from(e: diesel::result::ConnectionError) -> Self {
        StockroomError::DbError(e.to_string())
    }
}

impl From<url::ParseError> for StockroomError {
    fn from(e: url::ParseError) -> Self {
        StockroomError::Internal(e.to_string())
    }
}

impl From<regex::Error> for StockroomError {
    fn from(e: regex::Error) -> Self {
        StockroomError::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for StockroomError {
    fn from(e: serde_json::Error) -> Self {
        StockroomError::SerDe(e.to_string())
    }
}

impl From<serde_yaml::Error> for StockroomError {
    fn from(e: serde_yaml::Error) -> Self {
        StockroomError::SerDe(e.to_string())
    }
}

impl From<std::io::Error> for StockroomError {
    fn from(e: std::io::Error) -> Self {
        StockroomError::SerDe(e.to_string())
    }
}
