pub mod error;
pub mod export;
pub mod ids;
pub mod operations;
pub mod schema;
pub mod value;

pub use error::{CoreError, ValidationError};
pub use ids::*;
pub use operations::{OpState, OperationExpr, OperationKind, OperationRecord};
pub use schema::{Column, ColumnType, Schema};
pub use value::CellValue;
