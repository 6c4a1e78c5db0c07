pub mod cancel;
pub mod dataset;
pub mod error;
pub mod events;
pub mod session;
pub mod undo;

pub use cancel::CancelToken;
pub use dataset::{Dataset, ExecutionMode};
pub use error::EngineError;
pub use events::{NullObserver, QueueObserver};
pub use session::{AddOutcome, DatasetSession, SessionLimits, MAX_DATASETS};
pub use undo::{RedoOutcome, UndoOutcome};

use std::sync::Arc;

use framedeck_core::{OpId, OperationExpr, OperationRecord, ValidationError};
use framedeck_frame::FrameBackend;

/// Startup constants for one engine. Not runtime-mutable per dataset.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// A checkpoint is stored every this many successful executions.
    pub checkpoint_interval: usize,
    /// At most this many checkpoints are retained per dataset; older
    /// ones are pruned, and undo past the oldest falls back to replaying
    /// from the original frame.
    pub max_checkpoints: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 10,
            max_checkpoints: 8,
        }
    }
}

/// Rows fed to the dry-run validation sample.
pub const SAMPLE_ROWS: usize = 50;

/// Result of submitting a freshly validated operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Lazy mode: appended to the queue, frame untouched.
    Queued(OpId),
    /// Eager mode: applied immediately and recorded as executed.
    Applied(OpId),
}

/// Result of a single execution step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    Applied(OpId),
    Failed {
        op_id: OpId,
        label: String,
        error: String,
    },
    /// The queue was empty.
    Empty,
}

/// What `execute_all` accomplished before finishing, failing, or being
/// cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecSummary {
    pub applied: usize,
    pub remaining: usize,
    pub failure: Option<ExecFailure>,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecFailure {
    pub op_id: OpId,
    pub label: String,
    pub error: String,
}

/// Which way to resolve a reload whose replay failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadPolicy {
    /// Keep the previous in-memory state untouched.
    Abort,
    /// Adopt the refreshed frame and schema as-is, dropping every
    /// operation.
    ClearOperations,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    Reloaded { replayed: usize },
    /// Replay failed and the policy said to adopt the refreshed source.
    OperationsCleared { failed: ReplayFailure },
    /// Replay failed and the policy said to keep the prior state.
    Aborted { failed: ReplayFailure },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayFailure {
    pub op_id: OpId,
    pub label: String,
    pub error: String,
}

/// Applies operations to datasets: validation dry-runs, eager and queued
/// execution, checkpointing, undo/redo and reload. The engine holds no
/// dataset state of its own; it is shared behind an `Arc` and acts on
/// whichever dataset it is handed.
pub struct Engine<B: FrameBackend> {
    backend: Arc<B>,
    config: EngineConfig,
    observer: Arc<dyn QueueObserver>,
}

impl<B: FrameBackend> Engine<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_config(backend, EngineConfig::default())
    }

    pub fn with_config(backend: Arc<B>, config: EngineConfig) -> Self {
        Self {
            backend,
            config,
            observer: Arc::new(NullObserver),
        }
    }

    pub fn set_observer(&mut self, observer: Arc<dyn QueueObserver>) {
        self.observer = observer;
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Load a source into a fresh dataset. The frame as loaded doubles
    /// as the original frame for reload and undo-to-start.
    pub fn open_dataset(
        &self,
        name: impl Into<String>,
        source: impl Into<String>,
        mode: ExecutionMode,
    ) -> Result<Dataset<B::Frame>, EngineError> {
        let source = source.into();
        let (frame, schema) = self.backend.load(&source)?;
        Ok(Dataset::new(name, source, frame, schema, mode))
    }

    /// Validate an expression into a record: static parameter checks,
    /// then a dry-run against the first rows of the current frame to
    /// catch bad column references and type mismatches before queueing.
    /// Never mutates dataset state.
    pub fn prepare(
        &self,
        dataset: &Dataset<B::Frame>,
        expr: OperationExpr,
    ) -> Result<OperationRecord, ValidationError> {
        let record = OperationRecord::create(expr)?;
        let sample = self.backend.head(&dataset.frame, SAMPLE_ROWS);
        if let Err(e) = self.backend.apply(&sample, record.expr()) {
            return Err(ValidationError::DryRunFailed(e.to_string()));
        }
        Ok(record)
    }

    /// Submit a freshly validated record. Lazy mode queues it; eager
    /// mode applies it on the spot. An eager failure is returned to the
    /// caller and the record is not retained anywhere, so the caller
    /// must resubmit.
    ///
    /// A submission that lands diverges from the undone branch: the redo
    /// stack and checkpoints beyond the current executed count are
    /// dropped. A failed eager submission lands nowhere, so it leaves
    /// the redo branch intact.
    pub fn submit(
        &self,
        dataset: &mut Dataset<B::Frame>,
        record: OperationRecord,
    ) -> Result<SubmitOutcome, EngineError> {
        match dataset.execution_mode {
            ExecutionMode::Eager => {
                let op_id = record.op_id();
                let new_frame = self.backend.apply(&dataset.frame, record.expr())?;
                Self::truncate_redo_branch(dataset);
                self.finish_success(dataset, record, new_frame);
                Ok(SubmitOutcome::Applied(op_id))
            }
            ExecutionMode::Lazy => {
                let op_id = record.op_id();
                Self::truncate_redo_branch(dataset);
                if dataset.enqueue(record) {
                    self.observer.queue_became_visible(dataset.id);
                }
                Ok(SubmitOutcome::Queued(op_id))
            }
        }
    }

    fn truncate_redo_branch(dataset: &mut Dataset<B::Frame>) {
        dataset.undone.clear();
        let executed = dataset.executed.len();
        dataset.checkpoints.retain(|&i, _| i <= executed);
    }

    /// Remove the queue head, typically to clear or replace a failed
    /// operation blocking the queue. Fires the drain event when this
    /// empties the queue.
    pub fn remove_queue_head(
        &self,
        dataset: &mut Dataset<B::Frame>,
    ) -> Option<OperationRecord> {
        let (record, drained) = dataset.remove_queue_head()?;
        if drained {
            self.observer.queue_drained(dataset.id);
        }
        Some(record)
    }

    /// Execute the queue head against the current frame.
    ///
    /// On success the operation moves to the executed list, the frame is
    /// swapped, and a checkpoint may be stored. On failure the operation
    /// stays at the queue head marked `Failed`, and the frame is left
    /// unchanged; there is no partial mutation to roll back.
    pub fn execute_one(
        &self,
        dataset: &mut Dataset<B::Frame>,
    ) -> Result<ExecOutcome, EngineError> {
        let Some(head) = dataset.queued.front_mut() else {
            return Ok(ExecOutcome::Empty);
        };
        head.mark_executing();
        let result = self.backend.apply(&dataset.frame, head.expr());
        match result {
            Ok(new_frame) => {
                let Some(record) = dataset.queued.pop_front() else {
                    return Ok(ExecOutcome::Empty);
                };
                let op_id = record.op_id();
                self.finish_success(dataset, record, new_frame);
                if dataset.queued.is_empty() {
                    self.observer.queue_drained(dataset.id);
                }
                Ok(ExecOutcome::Applied(op_id))
            }
            Err(e) => {
                let error = e.to_string();
                head.mark_failed(error.clone());
                Ok(ExecOutcome::Failed {
                    op_id: head.op_id(),
                    label: head.label().to_string(),
                    error,
                })
            }
        }
    }

    /// Drain the queue with the stop-on-first-error policy: the frame
    /// always corresponds to a strict prefix of the intended sequence,
    /// never a subsequence with gaps.
    pub fn execute_all(
        &self,
        dataset: &mut Dataset<B::Frame>,
    ) -> Result<ExecSummary, EngineError> {
        self.execute_all_cancellable(dataset, &CancelToken::new())
    }

    /// `execute_all` with a cooperative cancellation check at each step
    /// boundary. Cancellation never interrupts a running operation.
    pub fn execute_all_cancellable(
        &self,
        dataset: &mut Dataset<B::Frame>,
        cancel: &CancelToken,
    ) -> Result<ExecSummary, EngineError> {
        let mut applied = 0;
        let mut failure = None;
        let mut cancelled = false;

        while !dataset.queued.is_empty() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            match self.execute_one(dataset)? {
                ExecOutcome::Applied(_) => applied += 1,
                ExecOutcome::Failed {
                    op_id,
                    label,
                    error,
                } => {
                    failure = Some(ExecFailure {
                        op_id,
                        label,
                        error,
                    });
                    break;
                }
                ExecOutcome::Empty => break,
            }
        }

        Ok(ExecSummary {
            applied,
            remaining: dataset.queued.len(),
            failure,
            cancelled,
        })
    }

    /// Re-read the dataset's source and replay the executed history on
    /// the side; nothing visible changes until the whole replay has
    /// succeeded, so the abort path leaves the prior frame byte-for-byte
    /// intact. Queued operations are never touched; they reapply on the
    /// next execution, not during reload.
    pub fn reload(
        &self,
        dataset: &mut Dataset<B::Frame>,
        policy: ReloadPolicy,
    ) -> Result<ReloadOutcome, EngineError> {
        let (new_original, new_schema) = self.backend.load(&dataset.source)?;

        let mut frame = new_original.clone();
        let mut checkpoints = std::collections::BTreeMap::new();
        let mut failure = None;
        for (i, record) in dataset.executed.iter().enumerate() {
            match self.backend.apply(&frame, record.expr()) {
                Ok(next) => {
                    frame = next;
                    let count = i + 1;
                    if count % self.config.checkpoint_interval == 0 {
                        checkpoints.insert(count, frame.clone());
                        while checkpoints.len() > self.config.max_checkpoints {
                            if let Some((&oldest, _)) = checkpoints.iter().next() {
                                checkpoints.remove(&oldest);
                            }
                        }
                    }
                }
                Err(e) => {
                    failure = Some(ReplayFailure {
                        op_id: record.op_id(),
                        label: record.label().to_string(),
                        error: e.to_string(),
                    });
                    break;
                }
            }
        }

        if let Some(failed) = failure {
            return Ok(match policy {
                ReloadPolicy::Abort => ReloadOutcome::Aborted { failed },
                ReloadPolicy::ClearOperations => {
                    let had_queue = !dataset.queued.is_empty();
                    dataset.clear_operations();
                    dataset.schema = new_schema;
                    dataset.original_frame = new_original.clone();
                    dataset.frame = new_original;
                    if had_queue {
                        self.observer.queue_drained(dataset.id);
                    }
                    ReloadOutcome::OperationsCleared { failed }
                }
            });
        }

        let replayed = dataset.executed.len();
        dataset.schema = self.backend.schema(&frame);
        dataset.original_frame = new_original;
        dataset.frame = frame;
        dataset.checkpoints = checkpoints;
        Ok(ReloadOutcome::Reloaded { replayed })
    }

    /// Record a successful application: executed list grows, the frame
    /// and schema advance, and every `checkpoint_interval` successes a
    /// snapshot is stored (bounded by `max_checkpoints`).
    fn finish_success(
        &self,
        dataset: &mut Dataset<B::Frame>,
        mut record: OperationRecord,
        new_frame: B::Frame,
    ) {
        record.mark_executed();
        dataset.frame = new_frame;
        dataset.schema = self.backend.schema(&dataset.frame);
        dataset.executed.push(record);

        let count = dataset.executed.len();
        if count % self.config.checkpoint_interval == 0 {
            dataset.checkpoints.insert(count, dataset.frame.clone());
            while dataset.checkpoints.len() > self.config.max_checkpoints {
                if let Some((&oldest, _)) = dataset.checkpoints.iter().next() {
                    dataset.checkpoints.remove(&oldest);
                }
            }
        }
    }
}
