//! Frame decoding and snapshot/patch classification.
//!
//! The wire carries no envelope. A frame is a patch batch iff it decodes to a
//! non-empty array whose every element has a string `op` and a string `path`;
//! anything else (including `[]`) is a full snapshot. A snapshot that happens
//! to have that shape is read as a patch batch.

use crate::error::{PatchError, Result, SyncError};
use crate::patch::{PatchBatch, PatchOperation};
use serde_json::Value;

/// Outcome of the shape heuristic alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Snapshot,
    PatchBatch,
}

/// A decoded, classified frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    /// Full replacement state.
    Snapshot(Value),
    /// Incremental update against the current state.
    Patch(PatchBatch),
}

/// Classify a decoded value by shape.
pub fn classify(value: &Value) -> FrameKind {
    match value {
        Value::Array(items) if is_patch_shaped(items) => FrameKind::PatchBatch,
        _ => FrameKind::Snapshot,
    }
}

fn is_patch_shaped(items: &[Value]) -> bool {
    !items.is_empty() && items.iter().all(is_operation_shaped)
}

fn is_operation_shaped(item: &Value) -> bool {
    item.get("op").is_some_and(Value::is_string) && item.get("path").is_some_and(Value::is_string)
}

/// Decode raw frame text and classify it.
///
/// Invalid JSON yields [`SyncError::Decode`]. A patch-shaped frame whose
/// operations are not valid RFC 6902 (unknown `op`, missing `value`/`from`,
/// bad pointer syntax) yields [`SyncError::PatchApply`] for the first
/// offending operation.
pub fn decode(raw: &str) -> Result<Frame> {
    let value: Value = serde_json::from_str(raw)?;
    into_frame(value)
}

/// Classify an already-decoded value.
pub fn into_frame(value: Value) -> Result<Frame> {
    match value {
        Value::Array(items) if is_patch_shaped(&items) => {
            let ops = items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    serde_json::from_value::<PatchOperation>(item).map_err(|e| {
                        SyncError::PatchApply {
                            index,
                            source: PatchError::Malformed(e.to_string()),
                        }
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Frame::Patch(PatchBatch::from_non_empty(ops)))
        }
        other => Ok(Frame::Snapshot(other)),
    }
}
