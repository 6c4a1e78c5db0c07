use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::operations::{OperationExpr, OperationRecord};

/// One operation in plain structured form for persistence/export
/// collaborators: kind tag, deterministic label, and the typed parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationExport {
    pub kind: String,
    pub label: String,
    pub params: OperationExpr,
}

impl OperationExport {
    pub fn from_record(record: &OperationRecord) -> Self {
        Self {
            kind: record.expr().kind_name().to_string(),
            label: record.label().to_string(),
            params: record.expr().clone(),
        }
    }
}

/// A dataset's ordered operation history: executed operations first (in
/// application order), then the still-pending queue. The engine never
/// writes files itself; consumers take these bytes wherever they go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetOpsExport {
    pub name: String,
    pub source: String,
    pub executed: Vec<OperationExport>,
    pub queued: Vec<OperationExport>,
}

impl DatasetOpsExport {
    pub fn to_msgpack(&self) -> Result<Vec<u8>, CoreError> {
        rmp_serde::to_vec(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, CoreError> {
        rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}
