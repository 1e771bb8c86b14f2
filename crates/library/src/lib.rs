pub mod cover;
pub mod error;
pub mod index;
pub mod mounts;
pub mod organize;
pub mod resolve;
pub mod scan;
pub mod sidecar;

pub use crate::index::{NoopIndex, SearchIndex};
pub use crate::mounts::{Mount, Mounts};
pub use crate::organize::{Action, organize_book};
pub use crate::resolve::{EntityCache, EntityStore, KeyedLocks, ResolutionCounts};
pub use crate::scan::{ScanEvent, ScanMode, ScanOptions, ScanOutcome, ScanSummary, ScanTarget, Scanner};
