use framedeck_core::{CoreError, ValidationError};
use framedeck_frame::{LoadError, TransformError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("load error: {0}")]
    Load(#[from] LoadError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("dataset busy: {0}")]
    Busy(String),
}
