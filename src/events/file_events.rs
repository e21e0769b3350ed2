//! File-universe change events.
//!
//! Auxiliary diagnostic output from plain set difference over the two
//! snapshots' file universes; not gated by any threshold.

use crate::ir::{ChangeDetail, ChangeEvent, ChangeType, EventIdAllocator, EvidenceItem};
use crate::snapshot::FileUniverseDiff;

/// Generates `file_added`, `file_removed`, and `file_reassigned` events.
#[must_use]
pub fn file_events_from_diff(
    diff: &FileUniverseDiff,
    ids: &mut EventIdAllocator,
) -> Vec<ChangeEvent> {
    let mut events = Vec::new();

    for f in &diff.added {
        events.push(ChangeEvent::new(
            ids.next_id(),
            ChangeType::FileAdded,
            1.0,
            format!("Added file {f}."),
            ChangeDetail::File { file: f.clone() },
            vec![EvidenceItem::new("NamedClusters", format!("file:{f}"), "Present in B, absent in A")],
        ));
    }

    for f in &diff.removed {
        events.push(ChangeEvent::new(
            ids.next_id(),
            ChangeType::FileRemoved,
            1.0,
            format!("Removed file {f}."),
            ChangeDetail::File { file: f.clone() },
            vec![EvidenceItem::new("NamedClusters", format!("file:{f}"), "Present in A, absent in B")],
        ));
    }

    for (f, ma, mb) in &diff.reassigned {
        events.push(ChangeEvent::new(
            ids.next_id(),
            ChangeType::FileReassigned,
            0.9,
            format!("File {f} reassigned from module {ma} to {mb}."),
            ChangeDetail::FileReassigned {
                file: f.clone(),
                from_module_uid: ma.clone(),
                to_module_uid: mb.clone(),
            },
            vec![
                EvidenceItem::new(
                    "NamedClusters",
                    format!("file:{f}"),
                    "Module ownership differs between versions",
                ),
                EvidenceItem::new("NamedClusters", format!("module:{ma}"), "A module"),
                EvidenceItem::new("NamedClusters", format!("module:{mb}"), "B module"),
            ],
        ));
    }

    events
}
