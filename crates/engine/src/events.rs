use framedeck_core::DatasetId;

/// Out-of-band notifications about queue visibility transitions, so an
/// operations-history display can show or hide itself. These are engine
/// side effects, never control flow: the engine behaves identically with
/// or without an observer attached.
pub trait QueueObserver: Send + Sync {
    /// The queue went from empty to non-empty.
    fn queue_became_visible(&self, _dataset: DatasetId) {}

    /// The queue drained back to empty.
    fn queue_drained(&self, _dataset: DatasetId) {}
}

/// Observer that ignores everything; the default when none is attached.
pub struct NullObserver;

impl QueueObserver for NullObserver {}
