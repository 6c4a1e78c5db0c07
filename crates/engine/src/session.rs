use std::sync::{Arc, Mutex, TryLockError};

use framedeck_core::{DatasetId, OperationExpr, OperationRecord, ValidationError};
use framedeck_frame::FrameBackend;

use crate::cancel::CancelToken;
use crate::dataset::{Dataset, ExecutionMode};
use crate::error::EngineError;
use crate::undo::{RedoOutcome, UndoOutcome};
use crate::{Engine, ExecOutcome, ExecSummary, ReloadOutcome, ReloadPolicy, SubmitOutcome};

/// Hard cap on simultaneously open datasets per session.
pub const MAX_DATASETS: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub max_datasets: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_datasets: MAX_DATASETS,
        }
    }
}

/// Result of asking the session to open a dataset. The near-limit
/// variant is advisory: the dataset was opened, but the caller should
/// surface the remaining headroom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added(DatasetId),
    AddedNearLimit { id: DatasetId, slots_left: usize },
    /// Nothing was loaded; the cap is checked before the source is read.
    RejectedAtLimit,
}

struct Entry<F> {
    id: DatasetId,
    dataset: Arc<Mutex<Dataset<F>>>,
}

/// The set of open datasets plus which one is active. Each dataset sits
/// behind its own mutex, so long-running work on one dataset never
/// blocks operations on another; only same-dataset calls serialize.
pub struct DatasetSession<B: FrameBackend> {
    engine: Arc<Engine<B>>,
    limits: SessionLimits,
    /// Insertion order, which is also the fallback-activation order.
    entries: Vec<Entry<B::Frame>>,
    active_id: Option<DatasetId>,
    /// Two datasets marked for side-by-side comparison, if any.
    paired: Option<(DatasetId, DatasetId)>,
}

impl<B: FrameBackend> DatasetSession<B> {
    pub fn new(engine: Arc<Engine<B>>) -> Self {
        Self::with_limits(engine, SessionLimits::default())
    }

    pub fn with_limits(engine: Arc<Engine<B>>, limits: SessionLimits) -> Self {
        Self {
            engine,
            limits,
            entries: Vec::new(),
            active_id: None,
            paired: None,
        }
    }

    pub fn engine(&self) -> &Arc<Engine<B>> {
        &self.engine
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn active_id(&self) -> Option<DatasetId> {
        self.active_id
    }

    pub fn paired(&self) -> Option<(DatasetId, DatasetId)> {
        self.paired
    }

    pub fn dataset_ids(&self) -> Vec<DatasetId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    /// Load a source as a new dataset. The capacity check happens before
    /// any loading work; a rejected open has no side effects. Duplicate
    /// names get a numeric suffix so every open dataset stays uniquely
    /// addressable by name. The first dataset opened becomes active.
    pub fn open(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
        mode: ExecutionMode,
    ) -> Result<AddOutcome, EngineError> {
        if self.entries.len() >= self.limits.max_datasets {
            return Ok(AddOutcome::RejectedAtLimit);
        }

        let name = self.unique_name(name.into());
        let mut dataset = self.engine.open_dataset(name, source, mode)?;
        let id = dataset.id();
        if self.entries.is_empty() {
            dataset.is_active = true;
            self.active_id = Some(id);
        }
        self.entries.push(Entry {
            id,
            dataset: Arc::new(Mutex::new(dataset)),
        });

        let slots_left = self.limits.max_datasets - self.entries.len();
        if slots_left <= 1 {
            Ok(AddOutcome::AddedNearLimit { id, slots_left })
        } else {
            Ok(AddOutcome::Added(id))
        }
    }

    /// Make exactly one dataset active. The previous active flag is
    /// cleared even when the same id is passed twice.
    pub fn set_active(&mut self, id: DatasetId) -> Result<(), EngineError> {
        if !self.entries.iter().any(|e| e.id == id) {
            return Err(EngineError::DatasetNotFound(id.to_string()));
        }
        for entry in &self.entries {
            let mut ds = entry.dataset.lock().unwrap_or_else(|p| p.into_inner());
            ds.is_active = entry.id == id;
        }
        self.active_id = Some(id);
        Ok(())
    }

    /// Close a dataset and drop all its state. If it was active, the
    /// first remaining dataset (in open order) becomes active. A pairing
    /// that referenced it is cleared.
    pub fn remove(&mut self, id: DatasetId) -> Result<(), EngineError> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| EngineError::DatasetNotFound(id.to_string()))?;
        self.entries.remove(idx);

        if let Some((a, b)) = self.paired {
            if a == id || b == id {
                self.paired = None;
            }
        }

        if self.active_id == Some(id) {
            self.active_id = None;
            if let Some(first) = self.entries.first() {
                let first_id = first.id;
                self.set_active(first_id)?;
            }
        }
        Ok(())
    }

    /// Mark two open datasets for side-by-side comparison.
    pub fn pair(&mut self, left: DatasetId, right: DatasetId) -> Result<(), EngineError> {
        for id in [left, right] {
            if !self.entries.iter().any(|e| e.id == id) {
                return Err(EngineError::DatasetNotFound(id.to_string()));
            }
        }
        self.paired = Some((left, right));
        Ok(())
    }

    pub fn unpair(&mut self) {
        self.paired = None;
    }

    /// Shared handle to a dataset, for callers that want to hold the
    /// lock across several reads.
    pub fn dataset(&self, id: DatasetId) -> Result<Arc<Mutex<Dataset<B::Frame>>>, EngineError> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| Arc::clone(&e.dataset))
            .ok_or_else(|| EngineError::DatasetNotFound(id.to_string()))
    }

    pub fn active_dataset(&self) -> Result<Arc<Mutex<Dataset<B::Frame>>>, EngineError> {
        let id = self
            .active_id
            .ok_or_else(|| EngineError::DatasetNotFound("no active dataset".into()))?;
        self.dataset(id)
    }

    /// Validate an expression against a dataset without mutating it.
    pub fn prepare(
        &self,
        id: DatasetId,
        expr: OperationExpr,
    ) -> Result<Result<OperationRecord, ValidationError>, EngineError> {
        let handle = self.dataset(id)?;
        let ds = handle.lock().unwrap_or_else(|p| p.into_inner());
        Ok(self.engine.prepare(&ds, expr))
    }

    pub fn submit(
        &self,
        id: DatasetId,
        record: OperationRecord,
    ) -> Result<SubmitOutcome, EngineError> {
        let handle = self.dataset(id)?;
        let mut ds = handle.lock().unwrap_or_else(|p| p.into_inner());
        self.engine.submit(&mut ds, record)
    }

    /// Drop a failed (or pending) queue head so execution can continue.
    pub fn remove_queue_head(&self, id: DatasetId) -> Result<Option<OperationRecord>, EngineError> {
        let handle = self.dataset(id)?;
        let mut ds = handle.lock().unwrap_or_else(|p| p.into_inner());
        Ok(self.engine.remove_queue_head(&mut ds))
    }

    pub fn execute_one(&self, id: DatasetId) -> Result<ExecOutcome, EngineError> {
        let handle = self.dataset(id)?;
        let mut ds = handle.lock().unwrap_or_else(|p| p.into_inner());
        self.engine.execute_one(&mut ds)
    }

    pub fn execute_all(&self, id: DatasetId) -> Result<ExecSummary, EngineError> {
        let handle = self.dataset(id)?;
        let mut ds = handle.lock().unwrap_or_else(|p| p.into_inner());
        self.engine.execute_all(&mut ds)
    }

    pub fn execute_all_cancellable(
        &self,
        id: DatasetId,
        cancel: &CancelToken,
    ) -> Result<ExecSummary, EngineError> {
        let handle = self.dataset(id)?;
        let mut ds = handle.lock().unwrap_or_else(|p| p.into_inner());
        self.engine.execute_all_cancellable(&mut ds, cancel)
    }

    pub fn undo(&self, id: DatasetId) -> Result<UndoOutcome, EngineError> {
        let handle = self.dataset(id)?;
        let mut ds = handle.lock().unwrap_or_else(|p| p.into_inner());
        self.engine.undo(&mut ds)
    }

    pub fn redo(&self, id: DatasetId) -> Result<RedoOutcome, EngineError> {
        let handle = self.dataset(id)?;
        let mut ds = handle.lock().unwrap_or_else(|p| p.into_inner());
        self.engine.redo(&mut ds)
    }

    /// Reload a dataset's source. Refuses rather than waits when the
    /// dataset is mid-operation, since a reload stacked behind a long
    /// batch is rarely what the caller meant.
    pub fn reload(&self, id: DatasetId, policy: ReloadPolicy) -> Result<ReloadOutcome, EngineError> {
        let handle = self.dataset(id)?;
        let mut ds = match handle.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
            Err(TryLockError::WouldBlock) => {
                return Err(EngineError::Busy(id.to_string()));
            }
        };
        self.engine.reload(&mut ds, policy)
    }

    fn unique_name(&self, base: String) -> String {
        let taken = |candidate: &str| {
            self.entries.iter().any(|e| {
                let ds = e.dataset.lock().unwrap_or_else(|p| p.into_inner());
                ds.name() == candidate
            })
        };
        if !taken(&base) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}_{n}");
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}
