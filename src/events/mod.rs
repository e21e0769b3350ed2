//! Change event generation.
//!
//! Two independent passes over the same two snapshots: the alignment-driven
//! pass is the primary pipeline, the overlap-driven pass is the coarser
//! legacy mode that also infers splits and merges. File-universe events are
//! auxiliary diagnostic output. All generators draw ids from one
//! caller-owned [`crate::ir::EventIdAllocator`].

pub mod file_events;
pub mod module_events;
pub mod overlap_events;

pub use file_events::file_events_from_diff;
pub use module_events::{build_module_level_events, SemanticInputs};
pub use overlap_events::infer_overlap_events;
