use framedeck_core::OpId;
use framedeck_frame::FrameBackend;

use crate::dataset::Dataset;
use crate::error::EngineError;
use crate::Engine;

/// Result of an undo request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    Undone(OpId),
    /// Nothing executed to undo.
    Nothing,
}

/// Result of a redo request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedoOutcome {
    Redone(OpId),
    /// The redone operation no longer applies to the current frame. It
    /// stays on the redo stack so the caller can inspect or discard it.
    Failed { op_id: OpId, error: String },
    /// Nothing undone to redo.
    Nothing,
}

impl<B: FrameBackend> Engine<B> {
    /// Undo the most recently executed operation by restoring the frame
    /// to the state before it ran: start from the nearest checkpoint at
    /// or below the target count (or the original frame) and replay the
    /// remaining prefix.
    ///
    /// Replay failures should not happen for a history that executed
    /// once already; if one does (a backend-level resource went away),
    /// the error propagates and the dataset is left unchanged.
    pub fn undo(&self, dataset: &mut Dataset<B::Frame>) -> Result<UndoOutcome, EngineError> {
        if dataset.executed.is_empty() {
            return Ok(UndoOutcome::Nothing);
        }
        let target = dataset.executed.len() - 1;
        let frame = self.restore_to(dataset, target)?;

        let Some(mut record) = dataset.executed.pop() else {
            return Ok(UndoOutcome::Nothing);
        };
        let op_id = record.op_id();
        record.mark_queued();
        dataset.undone.push(record);
        dataset.checkpoints.retain(|&i, _| i <= target);
        dataset.frame = frame;
        dataset.schema = self.backend.schema(&dataset.frame);
        Ok(UndoOutcome::Undone(op_id))
    }

    /// Reapply the most recently undone operation. A failure leaves the
    /// frame untouched and the record on the redo stack.
    pub fn redo(&self, dataset: &mut Dataset<B::Frame>) -> Result<RedoOutcome, EngineError> {
        let Some(record) = dataset.undone.pop() else {
            return Ok(RedoOutcome::Nothing);
        };
        let op_id = record.op_id();
        match self.backend.apply(&dataset.frame, record.expr()) {
            Ok(new_frame) => {
                self.finish_success(dataset, record, new_frame);
                Ok(RedoOutcome::Redone(op_id))
            }
            Err(e) => {
                let error = e.to_string();
                dataset.undone.push(record);
                Ok(RedoOutcome::Failed { op_id, error })
            }
        }
    }

    /// Undo everything, back to the frame as loaded. Returns how many
    /// operations were undone.
    pub fn undo_all(&self, dataset: &mut Dataset<B::Frame>) -> Result<usize, EngineError> {
        let mut undone = 0;
        while let UndoOutcome::Undone(_) = self.undo(dataset)? {
            undone += 1;
        }
        Ok(undone)
    }

    /// Build the frame corresponding to the first `target` executed
    /// operations, without touching the dataset.
    fn restore_to(
        &self,
        dataset: &Dataset<B::Frame>,
        target: usize,
    ) -> Result<B::Frame, EngineError> {
        let (start, mut frame) = match dataset.checkpoints.range(..=target).next_back() {
            Some((&count, snapshot)) => (count, snapshot.clone()),
            None => (0, dataset.original_frame.clone()),
        };
        for record in &dataset.executed[start..target] {
            frame = self.backend.apply(&frame, record.expr())?;
        }
        Ok(frame)
    }
}
