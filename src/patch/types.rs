//! JSON Patch batch type.

use serde::Serialize;

pub use json_patch::PatchOperation;

/// A non-empty, ordered list of operations applied as one unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PatchBatch(Vec<PatchOperation>);

impl PatchBatch {
    /// Returns `None` for an empty list.
    pub fn new(ops: Vec<PatchOperation>) -> Option<Self> {
        if ops.is_empty() {
            None
        } else {
            Some(PatchBatch(ops))
        }
    }

    /// Caller guarantees `ops` is non-empty.
    pub(crate) fn from_non_empty(ops: Vec<PatchOperation>) -> Self {
        debug_assert!(!ops.is_empty());
        PatchBatch(ops)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the batch has no operations. Never true for a constructed batch.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[PatchOperation] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PatchOperation> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<PatchOperation> {
        self.0
    }
}

impl<'a> IntoIterator for &'a PatchBatch {
    type Item = &'a PatchOperation;
    type IntoIter = std::slice::Iter<'a, PatchOperation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
