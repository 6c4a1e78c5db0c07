use std::collections::{BTreeMap, VecDeque};

use framedeck_core::export::{DatasetOpsExport, OperationExport};
use framedeck_core::{DatasetId, OperationRecord, Schema};

/// Whether submitted operations queue up for an explicit trigger or
/// apply the moment they arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Lazy,
    Eager,
}

/// One loaded table and everything the engine knows about it: the live
/// frame, the frame as first loaded, the pending queue, the executed
/// history, undo bookkeeping, and checkpoint snapshots.
///
/// All of this state is private to the dataset; nothing here is shared
/// across datasets, even when two datasets were loaded from the same
/// source.
pub struct Dataset<F> {
    pub(crate) id: DatasetId,
    pub(crate) name: String,
    pub(crate) source: String,
    pub(crate) schema: Schema,
    pub(crate) frame: F,
    pub(crate) original_frame: F,
    pub(crate) execution_mode: ExecutionMode,
    pub(crate) queued: VecDeque<OperationRecord>,
    pub(crate) executed: Vec<OperationRecord>,
    /// Frame snapshots keyed by executed-operation count, bounded by the
    /// engine's retention limit.
    pub(crate) checkpoints: BTreeMap<usize, F>,
    /// Most-recently-undone operations, for redo. Cleared on divergence.
    pub(crate) undone: Vec<OperationRecord>,
    pub(crate) is_active: bool,
}

impl<F: Clone> Dataset<F> {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        frame: F,
        schema: Schema,
        execution_mode: ExecutionMode,
    ) -> Self {
        Self {
            id: DatasetId::new(),
            name: name.into(),
            source: source.into(),
            schema,
            original_frame: frame.clone(),
            frame,
            execution_mode,
            queued: VecDeque::new(),
            executed: Vec::new(),
            checkpoints: BTreeMap::new(),
            undone: Vec::new(),
            is_active: false,
        }
    }

    pub fn id(&self) -> DatasetId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Schema of the current frame (not of the source as loaded).
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn frame(&self) -> &F {
        &self.frame
    }

    pub fn original_frame(&self) -> &F {
        &self.original_frame
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.execution_mode
    }

    pub fn queued_operations(&self) -> &VecDeque<OperationRecord> {
        &self.queued
    }

    pub fn executed_operations(&self) -> &[OperationRecord] {
        &self.executed
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn redo_depth(&self) -> usize {
        self.undone.len()
    }

    pub fn checkpoint_indices(&self) -> Vec<usize> {
        self.checkpoints.keys().copied().collect()
    }

    /// Append to the queue. Returns true when the queue transitioned
    /// from empty to non-empty (the visibility event edge).
    pub(crate) fn enqueue(&mut self, record: OperationRecord) -> bool {
        let was_empty = self.queued.is_empty();
        self.queued.push_back(record);
        was_empty
    }

    /// Remove the queue head. Returns true when this drained the queue;
    /// the engine owns firing the drain event, so this stays crate-only.
    pub(crate) fn remove_queue_head(&mut self) -> Option<(OperationRecord, bool)> {
        let record = self.queued.pop_front()?;
        Some((record, self.queued.is_empty()))
    }

    /// Drop every operation and all undo bookkeeping, keeping the
    /// current frame. Used when adopting a refreshed source as-is.
    pub(crate) fn clear_operations(&mut self) {
        self.queued.clear();
        self.executed.clear();
        self.undone.clear();
        self.checkpoints.clear();
    }

    /// Plain structured form of the operation history for persistence and
    /// export collaborators: executed first, then the pending queue, in
    /// order.
    pub fn export_operations(&self) -> DatasetOpsExport {
        DatasetOpsExport {
            name: self.name.clone(),
            source: self.source.clone(),
            executed: self.executed.iter().map(OperationExport::from_record).collect(),
            queued: self.queued.iter().map(OperationExport::from_record).collect(),
        }
    }
}
