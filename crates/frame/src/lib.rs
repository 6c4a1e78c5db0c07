pub mod csv;
pub mod error;
pub mod mem;
pub mod traits;

pub use error::{LoadError, TransformError};
pub use mem::{MemBackend, MemFrame};
pub use traits::FrameBackend;
