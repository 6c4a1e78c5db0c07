use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Rejection of an operation's parameters before it is ever queued or
/// executed. Validation never touches dataset state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("operation requires at least one column")]
    EmptyColumnList,

    #[error("column listed more than once: {0}")]
    DuplicateColumn(String),

    #[error("sort requires at least one key")]
    EmptySortKeys,

    #[error("aggregate requires at least one aggregation")]
    EmptyAggregates,

    #[error("rename source and target are the same column: {0}")]
    SelfRename(String),

    #[error("row count must be greater than zero")]
    ZeroRowCount,

    #[error("derived column name is empty")]
    EmptyColumnName,

    #[error("join requires at least one key column")]
    EmptyJoinKeys,

    #[error("join right-hand source locator is empty")]
    EmptyJoinSource,

    #[error("filter value may not be null; use drop-null or fill-null instead")]
    NullFilterValue,

    #[error("dry run against sample rows failed: {0}")]
    DryRunFailed(String),
}
