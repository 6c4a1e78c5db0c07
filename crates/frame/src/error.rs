use thiserror::Error;

/// Failure to apply one operation to a frame. The input frame is never
/// mutated; a failed apply leaves no trace.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("column already exists: {0}")]
    DuplicateColumn(String),

    #[error("type mismatch on column {column}: expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },

    #[error("operation would drop every column")]
    WouldDropAllColumns,

    #[error("join right-hand source not loadable: {0}")]
    UnknownRightSource(String),

    #[error("arithmetic error: {0}")]
    Arithmetic(String),
}

/// Failure to read a source locator into a frame, at initial load or
/// at reload.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("source has no data: {0}")]
    Empty(String),
}
