//! Error types for the planner.

use thiserror::Error;

/// Planner error type
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Coordinate out of map bounds: {0}")]
    OutOfBounds(String),

    #[error("Cost map error: {0}")]
    CostMap(String),

    #[error("Persisted table error: {0}")]
    Persist(String),

    #[error("Precomputation worker failed: {0}")]
    Worker(String),
}

impl From<postcard::Error> for PlannerError {
    fn from(e: postcard::Error) -> Self {
        PlannerError::Persist(e.to_string())
    }
}

impl From<toml::de::Error> for PlannerError {
    fn from(e: toml::de::Error) -> Self {
        PlannerError::InvalidConfig(e.to_string())
    }
}

impl From<image::ImageError> for PlannerError {
    fn from(e: image::ImageError) -> Self {
        PlannerError::CostMap(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlannerError>;
