use framedeck_core::{OperationExpr, Schema};

use crate::error::{LoadError, TransformError};

/// The narrow boundary to the tabular computation engine. The execution
/// engine is generic over this trait and never looks inside a frame.
///
/// Two method groups: the transform interface (`apply` plus inspection
/// helpers) and the loader interface (`load`). `apply` must be
/// deterministic given identical frame and operation, and must not mutate
/// its input; the engine keeps `original_frame` and checkpoint frames
/// alive and relies on later operations leaving them untouched.
pub trait FrameBackend: Send + Sync {
    /// Opaque, cheaply clonable handle to tabular data.
    type Frame: Clone + Send + Sync;

    fn apply(
        &self,
        frame: &Self::Frame,
        expr: &OperationExpr,
    ) -> Result<Self::Frame, TransformError>;

    fn load(&self, source: &str) -> Result<(Self::Frame, Schema), LoadError>;

    fn schema(&self, frame: &Self::Frame) -> Schema;

    fn row_count(&self, frame: &Self::Frame) -> usize;

    /// First `rows` rows; used for dry-run validation samples.
    fn head(&self, frame: &Self::Frame, rows: usize) -> Self::Frame;

    /// Content hash over schema and rows. Equal fingerprints mean equal
    /// frames; used for checkpoint and reload equivalence checks.
    fn fingerprint(&self, frame: &Self::Frame) -> [u8; 32];
}
