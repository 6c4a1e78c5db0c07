use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::ids::OpId;
use crate::value::CellValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Contains => "contains",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggFunc {
    Count,
    Sum,
    Mean,
    Min,
    Max,
}

impl AggFunc {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggSpec {
    pub column: String,
    pub func: AggFunc,
    pub alias: Option<String>,
}

impl AggSpec {
    pub fn new(column: impl Into<String>, func: AggFunc) -> Self {
        Self {
            column: column.into(),
            func,
            alias: None,
        }
    }

    /// Name of the output column: the alias when given, otherwise
    /// `func_column` (e.g. `sum_amount`).
    pub fn output_name(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => format!("{}_{}", self.func.as_str(), self.column),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inner => "inner",
            Self::Left => "left",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Column(String),
    Literal(CellValue),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(name) => write!(f, "{name}"),
            Self::Literal(value) => write!(f, "{value}"),
        }
    }
}

/// A binary arithmetic expression over columns and literals, used by the
/// derive-column operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeriveExpr {
    pub left: Operand,
    pub op: ArithOp,
    pub right: Operand,
}

/// Tag identifying the transformation category of an operation. Closed
/// enumeration: not user-extensible at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Filter,
    Select,
    Sort,
    Aggregate,
    Pivot,
    Join,
    Rename,
    Drop,
    FillNull,
    DropNull,
    Dedupe,
    Head,
    Tail,
    Sample,
    DeriveColumn,
}

/// Backend-agnostic description of one transformation: a tagged variant
/// with typed parameters, sufficient for a tabular backend to execute.
/// Parameters never change after creation; editing is replace-with-new-id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationExpr {
    Filter {
        column: String,
        op: CompareOp,
        value: CellValue,
    },
    Select {
        columns: Vec<String>,
    },
    Sort {
        keys: Vec<SortKey>,
    },
    Aggregate {
        group_by: Vec<String>,
        aggregates: Vec<AggSpec>,
    },
    Pivot {
        index: String,
        columns: String,
        values: String,
        agg: AggFunc,
    },
    Join {
        right_source: String,
        on: Vec<String>,
        how: JoinKind,
    },
    Rename {
        from: String,
        to: String,
    },
    Drop {
        columns: Vec<String>,
    },
    /// Empty `columns` means every column.
    FillNull {
        columns: Vec<String>,
        value: CellValue,
    },
    /// Drops rows with a null in any of `columns`; empty means any column.
    DropNull {
        columns: Vec<String>,
    },
    /// Empty `columns` means deduplicate on the full row.
    Dedupe {
        columns: Vec<String>,
    },
    Head {
        rows: usize,
    },
    Tail {
        rows: usize,
    },
    Sample {
        rows: usize,
        seed: Option<u64>,
    },
    DeriveColumn {
        name: String,
        expr: DeriveExpr,
    },
}

impl OperationExpr {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Filter { .. } => OperationKind::Filter,
            Self::Select { .. } => OperationKind::Select,
            Self::Sort { .. } => OperationKind::Sort,
            Self::Aggregate { .. } => OperationKind::Aggregate,
            Self::Pivot { .. } => OperationKind::Pivot,
            Self::Join { .. } => OperationKind::Join,
            Self::Rename { .. } => OperationKind::Rename,
            Self::Drop { .. } => OperationKind::Drop,
            Self::FillNull { .. } => OperationKind::FillNull,
            Self::DropNull { .. } => OperationKind::DropNull,
            Self::Dedupe { .. } => OperationKind::Dedupe,
            Self::Head { .. } => OperationKind::Head,
            Self::Tail { .. } => OperationKind::Tail,
            Self::Sample { .. } => OperationKind::Sample,
            Self::DeriveColumn { .. } => OperationKind::DeriveColumn,
        }
    }

    /// String name of the operation kind for export/indexing.
    pub fn kind_name(&self) -> &'static str {
        match self.kind() {
            OperationKind::Filter => "filter",
            OperationKind::Select => "select",
            OperationKind::Sort => "sort",
            OperationKind::Aggregate => "aggregate",
            OperationKind::Pivot => "pivot",
            OperationKind::Join => "join",
            OperationKind::Rename => "rename",
            OperationKind::Drop => "drop",
            OperationKind::FillNull => "fill-null",
            OperationKind::DropNull => "drop-null",
            OperationKind::Dedupe => "dedupe",
            OperationKind::Head => "head",
            OperationKind::Tail => "tail",
            OperationKind::Sample => "sample",
            OperationKind::DeriveColumn => "derive-column",
        }
    }

    /// Human-readable one-line description, derived deterministically from
    /// the kind and parameters.
    pub fn label(&self) -> String {
        match self {
            Self::Filter { column, op, value } => {
                format!("Filter: {column} {op} {value}")
            }
            Self::Select { columns } => format!("Select: {}", columns.join(", ")),
            Self::Sort { keys } => {
                let parts: Vec<String> = keys
                    .iter()
                    .map(|k| {
                        if k.descending {
                            format!("{} desc", k.column)
                        } else {
                            k.column.clone()
                        }
                    })
                    .collect();
                format!("Sort: {}", parts.join(", "))
            }
            Self::Aggregate {
                group_by,
                aggregates,
            } => {
                let aggs: Vec<String> = aggregates
                    .iter()
                    .map(|a| format!("{}({})", a.func.as_str(), a.column))
                    .collect();
                if group_by.is_empty() {
                    format!("Aggregate: {}", aggs.join(", "))
                } else {
                    format!("Aggregate: {} by {}", aggs.join(", "), group_by.join(", "))
                }
            }
            Self::Pivot {
                index,
                columns,
                values,
                agg,
            } => format!(
                "Pivot: {}({values}) over {columns}, indexed by {index}",
                agg.as_str()
            ),
            Self::Join {
                right_source,
                on,
                how,
            } => format!(
                "Join: {} with {right_source} on {}",
                how.as_str(),
                on.join(", ")
            ),
            Self::Rename { from, to } => format!("Rename: {from} -> {to}"),
            Self::Drop { columns } => format!("Drop: {}", columns.join(", ")),
            Self::FillNull { columns, value } => {
                if columns.is_empty() {
                    format!("Fill null: all columns with {value}")
                } else {
                    format!("Fill null: {} with {value}", columns.join(", "))
                }
            }
            Self::DropNull { columns } => {
                if columns.is_empty() {
                    "Drop null: any column".to_string()
                } else {
                    format!("Drop null: {}", columns.join(", "))
                }
            }
            Self::Dedupe { columns } => {
                if columns.is_empty() {
                    "Dedupe: full rows".to_string()
                } else {
                    format!("Dedupe: {}", columns.join(", "))
                }
            }
            Self::Head { rows } => format!("Head: {rows} rows"),
            Self::Tail { rows } => format!("Tail: {rows} rows"),
            Self::Sample { rows, seed } => match seed {
                Some(seed) => format!("Sample: {rows} rows (seed {seed})"),
                None => format!("Sample: {rows} rows"),
            },
            Self::DeriveColumn { name, expr } => {
                format!("Derive: {name} = {} {} {}", expr.left, expr.op, expr.right)
            }
        }
    }

    /// Static parameter-completeness validation. Column references are not
    /// resolved here; that is the dry-run's job, since it needs a frame.
    pub fn validate(&self) -> Result<(), ValidationError> {
        fn no_duplicates(columns: &[String]) -> Result<(), ValidationError> {
            for (i, col) in columns.iter().enumerate() {
                if columns[..i].contains(col) {
                    return Err(ValidationError::DuplicateColumn(col.clone()));
                }
            }
            Ok(())
        }

        match self {
            Self::Filter { value, .. } => {
                if value.is_null() {
                    return Err(ValidationError::NullFilterValue);
                }
            }
            Self::Select { columns } | Self::Drop { columns } => {
                if columns.is_empty() {
                    return Err(ValidationError::EmptyColumnList);
                }
                no_duplicates(columns)?;
            }
            Self::Sort { keys } => {
                if keys.is_empty() {
                    return Err(ValidationError::EmptySortKeys);
                }
                let columns: Vec<String> = keys.iter().map(|k| k.column.clone()).collect();
                no_duplicates(&columns)?;
            }
            Self::Aggregate {
                group_by,
                aggregates,
            } => {
                if aggregates.is_empty() {
                    return Err(ValidationError::EmptyAggregates);
                }
                no_duplicates(group_by)?;
            }
            Self::Pivot { .. } => {}
            Self::Join {
                right_source, on, ..
            } => {
                if on.is_empty() {
                    return Err(ValidationError::EmptyJoinKeys);
                }
                if right_source.is_empty() {
                    return Err(ValidationError::EmptyJoinSource);
                }
                no_duplicates(on)?;
            }
            Self::Rename { from, to } => {
                if from == to {
                    return Err(ValidationError::SelfRename(from.clone()));
                }
            }
            Self::FillNull { columns, .. }
            | Self::DropNull { columns }
            | Self::Dedupe { columns } => {
                no_duplicates(columns)?;
            }
            Self::Head { rows } | Self::Tail { rows } | Self::Sample { rows, .. } => {
                if *rows == 0 {
                    return Err(ValidationError::ZeroRowCount);
                }
            }
            Self::DeriveColumn { name, .. } => {
                if name.is_empty() {
                    return Err(ValidationError::EmptyColumnName);
                }
            }
        }
        Ok(())
    }
}

/// Execution state of an operation. `Executing` is transient and
/// observable only; the export surface carries no state at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpState {
    Queued,
    Executing,
    Executed,
    Failed,
}

/// Immutable description of one transformation step. Only `state` and
/// `error` ever change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    op_id: OpId,
    expr: OperationExpr,
    label: String,
    state: OpState,
    error: Option<String>,
}

impl OperationRecord {
    /// Validate parameters and mint a record. Never mutates any dataset
    /// state; a failure produces no record at all.
    pub fn create(expr: OperationExpr) -> Result<Self, ValidationError> {
        expr.validate()?;
        let label = expr.label();
        Ok(Self {
            op_id: OpId::new(),
            expr,
            label,
            state: OpState::Queued,
            error: None,
        })
    }

    pub fn op_id(&self) -> OpId {
        self.op_id
    }

    pub fn expr(&self) -> &OperationExpr {
        &self.expr
    }

    pub fn kind(&self) -> OperationKind {
        self.expr.kind()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> OpState {
        self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn mark_executing(&mut self) {
        self.state = OpState::Executing;
    }

    pub fn mark_executed(&mut self) {
        self.state = OpState::Executed;
        self.error = None;
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.state = OpState::Failed;
        self.error = Some(message.into());
    }

    pub fn mark_queued(&mut self) {
        self.state = OpState::Queued;
        self.error = None;
    }
}
