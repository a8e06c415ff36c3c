//! Patch application.

use super::types::{PatchBatch, PatchOperation};
use crate::error::{PatchError, Result, SyncError};
use json_patch::PatchErrorKind;
use serde_json::Value;

/// Apply a whole batch to a copy of `state`.
///
/// The input is never mutated. If any operation fails the copy is discarded
/// and the error names the failing operation's position in the batch.
pub fn apply_batch(state: &Value, batch: &PatchBatch) -> Result<Value> {
    let mut doc = state.clone();
    json_patch::patch(&mut doc, batch.as_slice()).map_err(|e| SyncError::PatchApply {
        index: e.operation,
        source: describe(&e, batch.as_slice()),
    })?;
    Ok(doc)
}

/// Apply a single operation in place. On failure `doc` is left unchanged.
pub fn apply_operation(
    doc: &mut Value,
    op: &PatchOperation,
) -> std::result::Result<(), PatchError> {
    let ops = std::slice::from_ref(op);
    json_patch::patch(doc, ops).map_err(|e| describe(&e, ops))
}

fn describe(error: &json_patch::PatchError, ops: &[PatchOperation]) -> PatchError {
    let path = error.path.as_str().to_string();
    match &error.kind {
        PatchErrorKind::TestFailed => PatchError::TestFailed(path),
        PatchErrorKind::InvalidPointer => PatchError::InvalidPath(path),
        PatchErrorKind::InvalidFromPointer => {
            PatchError::InvalidFrom(source_pointer(ops.get(error.operation)))
        }
        PatchErrorKind::CannotMoveInsideItself => PatchError::MoveIntoChild {
            from: source_pointer(ops.get(error.operation)),
            path,
        },
        _ => PatchError::Rejected(error.to_string()),
    }
}

/// `from` of a `move` or `copy`.
fn source_pointer(op: Option<&PatchOperation>) -> String {
    match op {
        Some(PatchOperation::Move(op)) => op.from.as_str().to_string(),
        Some(PatchOperation::Copy(op)) => op.from.as_str().to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn op(raw: Value) -> PatchOperation {
        serde_json::from_value(raw).unwrap()
    }

    fn batch(ops: Value) -> PatchBatch {
        let ops: Vec<PatchOperation> = serde_json::from_value(ops).unwrap();
        PatchBatch::new(ops).unwrap()
    }

    // --- Single Operations ---

    #[test]
    fn test_replace() {
        let state = json!([{"localteam": {"goals": "0"}}]);
        let result = apply_batch(
            &state,
            &batch(json!([{"op": "replace", "path": "/0/localteam/goals", "value": "1"}])),
        )
        .unwrap();
        assert_eq!(result, json!([{"localteam": {"goals": "1"}}]));
        // Input untouched.
        assert_eq!(state, json!([{"localteam": {"goals": "0"}}]));
    }

    #[test]
    fn test_replace_missing_fails() {
        let mut doc = json!({"localteam": {"goals": "1"}});
        let result = apply_operation(
            &mut doc,
            &op(json!({"op": "replace", "path": "/localteam/assists", "value": "1"})),
        );
        assert_eq!(
            result,
            Err(PatchError::InvalidPath("/localteam/assists".to_string()))
        );
        assert_eq!(doc, json!({"localteam": {"goals": "1"}}));
    }

    #[test]
    fn test_add_to_object_and_array() {
        let mut doc = json!({"events": [1, 3]});
        apply_operation(&mut doc, &op(json!({"op": "add", "path": "/events/1", "value": 2})))
            .unwrap();
        apply_operation(&mut doc, &op(json!({"op": "add", "path": "/events/-", "value": 4})))
            .unwrap();
        apply_operation(&mut doc, &op(json!({"op": "add", "path": "/timer", "value": "45"})))
            .unwrap();
        assert_eq!(doc, json!({"events": [1, 2, 3, 4], "timer": "45"}));
    }

    #[test]
    fn test_add_index_past_end_fails() {
        let mut doc = json!([1]);
        let result = apply_operation(&mut doc, &op(json!({"op": "add", "path": "/5", "value": 0})));
        assert_eq!(result, Err(PatchError::InvalidPath("/5".to_string())));
    }

    #[test]
    fn test_add_leading_zero_index_fails() {
        let mut doc = json!([1, 2]);
        let result =
            apply_operation(&mut doc, &op(json!({"op": "add", "path": "/01", "value": 0})));
        assert!(matches!(result, Err(PatchError::InvalidPath(_))));
        assert_eq!(doc, json!([1, 2]));
    }

    #[test]
    fn test_add_missing_parent_fails() {
        let mut doc = json!({});
        let result =
            apply_operation(&mut doc, &op(json!({"op": "add", "path": "/a/b", "value": 0})));
        assert!(matches!(result, Err(PatchError::InvalidPath(_))));
    }

    #[test]
    fn test_add_root_replaces_document() {
        let mut doc = json!([1, 2]);
        apply_operation(&mut doc, &op(json!({"op": "add", "path": "", "value": {"x": 1}})))
            .unwrap();
        assert_eq!(doc, json!({"x": 1}));
    }

    #[test]
    fn test_escaped_tokens() {
        let mut doc = json!({"a/b": 1, "m~n": 2});
        apply_operation(&mut doc, &op(json!({"op": "replace", "path": "/a~1b", "value": 3})))
            .unwrap();
        apply_operation(&mut doc, &op(json!({"op": "remove", "path": "/m~0n"}))).unwrap();
        assert_eq!(doc, json!({"a/b": 3}));
    }

    #[test]
    fn test_remove() {
        let mut doc = json!({"a": 1, "list": ["x", "y", "z"]});
        apply_operation(&mut doc, &op(json!({"op": "remove", "path": "/a"}))).unwrap();
        apply_operation(&mut doc, &op(json!({"op": "remove", "path": "/list/1"}))).unwrap();
        assert_eq!(doc, json!({"list": ["x", "z"]}));

        let result = apply_operation(&mut doc, &op(json!({"op": "remove", "path": "/list/2"})));
        assert!(matches!(result, Err(PatchError::InvalidPath(_))));
        let result = apply_operation(&mut doc, &op(json!({"op": "remove", "path": ""})));
        assert!(matches!(result, Err(PatchError::InvalidPath(_))));
    }

    #[test]
    fn test_move_and_copy() {
        let mut doc = json!({"a": {"b": 1}, "c": []});
        apply_operation(&mut doc, &op(json!({"op": "copy", "from": "/a/b", "path": "/c/-"})))
            .unwrap();
        apply_operation(&mut doc, &op(json!({"op": "move", "from": "/a", "path": "/d"})))
            .unwrap();
        assert_eq!(doc, json!({"c": [1], "d": {"b": 1}}));
    }

    #[test]
    fn test_copy_missing_source_fails() {
        let mut doc = json!({"a": 1});
        let result =
            apply_operation(&mut doc, &op(json!({"op": "copy", "from": "/z", "path": "/b"})));
        assert_eq!(result, Err(PatchError::InvalidFrom("/z".to_string())));
    }

    #[test]
    fn test_move_into_own_child_fails() {
        let mut doc = json!({"a": {"b": {}}});
        let result =
            apply_operation(&mut doc, &op(json!({"op": "move", "from": "/a", "path": "/a/b/c"})));
        assert_eq!(
            result,
            Err(PatchError::MoveIntoChild {
                from: "/a".to_string(),
                path: "/a/b/c".to_string()
            })
        );
        assert_eq!(doc, json!({"a": {"b": {}}}));
    }

    #[test]
    fn test_move_onto_itself_is_noop() {
        let mut doc = json!({"a": 1});
        apply_operation(&mut doc, &op(json!({"op": "move", "from": "/a", "path": "/a"})))
            .unwrap();
        assert_eq!(doc, json!({"a": 1}));
    }

    // --- Test Operation ---

    #[test]
    fn test_test_op() {
        let mut doc = json!({"status": "1st Half", "goals": 1});
        apply_operation(&mut doc, &op(json!({"op": "test", "path": "/status", "value": "1st Half"})))
            .unwrap();
        apply_operation(&mut doc, &op(json!({"op": "test", "path": "/goals", "value": 1})))
            .unwrap();
        let result =
            apply_operation(&mut doc, &op(json!({"op": "test", "path": "/status", "value": "HT"})));
        assert_eq!(result, Err(PatchError::TestFailed("/status".to_string())));
    }

    #[test]
    fn test_test_large_integers_compare_exactly() {
        let state = json!({"n": 9007199254740993u64});
        let result = apply_batch(
            &state,
            &batch(json!([
                {"op": "test", "path": "/n", "value": 9007199254740992u64},
                {"op": "replace", "path": "/n", "value": 0}
            ])),
        );
        assert!(matches!(
            result,
            Err(SyncError::PatchApply {
                index: 0,
                source: PatchError::TestFailed(_)
            })
        ));
    }

    #[test]
    fn test_test_missing_path_fails() {
        let mut doc = json!({});
        let result =
            apply_operation(&mut doc, &op(json!({"op": "test", "path": "/x", "value": null})));
        assert!(matches!(result, Err(PatchError::InvalidPath(_))));
    }

    // --- Batches ---

    #[test]
    fn test_batch_is_all_or_nothing() {
        let state = json!({"score": [0, 0], "status": "1st Half"});
        let result = apply_batch(
            &state,
            &batch(json!([
                {"op": "replace", "path": "/score/0", "value": 1},
                {"op": "test", "path": "/status", "value": "FT"},
                {"op": "replace", "path": "/status", "value": "2nd Half"}
            ])),
        );
        match result {
            Err(SyncError::PatchApply { index, source }) => {
                assert_eq!(index, 1);
                assert!(matches!(source, PatchError::TestFailed(_)));
            }
            other => panic!("Expected PatchApply error, got {:?}", other),
        }
        assert_eq!(state, json!({"score": [0, 0], "status": "1st Half"}));
    }
}
