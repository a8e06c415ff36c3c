//! RFC 6902 JSON Patch support.
//!
//! Operations are `json_patch` operations. Batches are applied copy-on-write:
//! [`apply_batch`] clones the current document, patches the clone and
//! returns it only if every operation succeeds.

mod operations;
mod types;

pub use operations::{apply_batch, apply_operation};
pub use types::{PatchBatch, PatchOperation};
