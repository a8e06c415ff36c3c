//! Consumer projections: pure views derived from a topic's full state.
//!
//! A projection is any `Fn(&Arc<Value>) -> V`. It runs once on subscribe and
//! again on every reconciled update, so it must stay cheap and side-effect
//! free. The helpers here cover the common dashboard views.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// How to read an entity's id from its record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdAccessor {
    /// Top-level field, e.g. `match_id`.
    Field(String),
    /// JSON Pointer relative to the entity, e.g. `/meta/id`.
    Pointer(String),
}

impl IdAccessor {
    pub fn field(name: impl Into<String>) -> Self {
        IdAccessor::Field(name.into())
    }

    /// Raw id value of an entity.
    pub fn id_of<'a>(&self, entity: &'a Value) -> Option<&'a Value> {
        match self {
            IdAccessor::Field(name) => entity.get(name),
            IdAccessor::Pointer(pointer) => entity.pointer(pointer),
        }
    }

    /// Whether the entity's id reads as `id`. Strings and numbers compare by
    /// their text, so `"1"` matches `1`.
    pub fn matches(&self, entity: &Value, id: &str) -> bool {
        match self.id_of(entity) {
            Some(Value::String(s)) => s == id,
            Some(Value::Number(n)) => n.to_string() == id,
            _ => false,
        }
    }
}

impl Default for IdAccessor {
    fn default() -> Self {
        IdAccessor::Field("id".to_string())
    }
}

/// Entity records in a state document.
///
/// Arrays yield their elements, objects their values (collections keyed by
/// id), anything else nothing.
pub fn records(state: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match state {
        Value::Array(items) => Box::new(items.iter()),
        Value::Object(map) => Box::new(map.values()),
        _ => Box::new(std::iter::empty()),
    }
}

/// First entity whose id matches.
pub fn find_entity<'a>(state: &'a Value, ids: &IdAccessor, id: &str) -> Option<&'a Value> {
    records(state).find(|entity| ids.matches(entity, id))
}

/// The whole state, unfiltered.
pub fn identity() -> impl Fn(&Arc<Value>) -> Arc<Value> + Send + Sync + 'static {
    |state: &Arc<Value>| state.clone()
}

/// The single entity with the given id.
pub fn by_id(
    ids: IdAccessor,
    id: impl Into<String>,
) -> impl Fn(&Arc<Value>) -> Option<Value> + Send + Sync + 'static {
    let id = id.into();
    move |state: &Arc<Value>| find_entity(state, &ids, &id).cloned()
}

/// A field nested in the entity with the given id, e.g. its `events` array.
///
/// `field` starting with `/` is read as a JSON Pointer into the entity.
pub fn nested(
    ids: IdAccessor,
    id: impl Into<String>,
    field: impl Into<String>,
) -> impl Fn(&Arc<Value>) -> Option<Value> + Send + Sync + 'static {
    let id = id.into();
    let field = field.into();
    move |state: &Arc<Value>| {
        let entity = find_entity(state, &ids, &id)?;
        if field.starts_with('/') {
            entity.pointer(&field).cloned()
        } else {
            entity.get(&field).cloned()
        }
    }
}

/// All entities decoded as `T`; records that do not decode are skipped.
pub fn entities<T>() -> impl Fn(&Arc<Value>) -> Vec<T> + Send + Sync + 'static
where
    T: DeserializeOwned + 'static,
{
    |state: &Arc<Value>| {
        records(state)
            .filter_map(|entity| T::deserialize(entity).ok())
            .collect()
    }
}

/// The entity with the given id decoded as `T`.
pub fn entity<T>(
    ids: IdAccessor,
    id: impl Into<String>,
) -> impl Fn(&Arc<Value>) -> Option<T> + Send + Sync + 'static
where
    T: DeserializeOwned + 'static,
{
    let id = id.into();
    move |state: &Arc<Value>| {
        find_entity(state, &ids, &id).and_then(|entity| T::deserialize(entity).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn fixtures() -> Arc<Value> {
        Arc::new(json!([
            {"match_id": "1", "status": "1st Half", "events": [{"minute": 12, "type": "goal"}]},
            {"match_id": 2, "status": "HT", "events": []},
            {"status": "no id"}
        ]))
    }

    #[test]
    fn test_identity_shares_state() {
        let state = fixtures();
        let view = identity()(&state);
        assert!(Arc::ptr_eq(&view, &state));
    }

    #[test]
    fn test_by_id_string_and_number() {
        let state = fixtures();
        let first = by_id(IdAccessor::field("match_id"), "1")(&state).unwrap();
        assert_eq!(first["status"], "1st Half");

        let second = by_id(IdAccessor::field("match_id"), "2")(&state).unwrap();
        assert_eq!(second["status"], "HT");

        assert!(by_id(IdAccessor::field("match_id"), "3")(&state).is_none());
    }

    #[test]
    fn test_nested_field_and_pointer() {
        let state = fixtures();
        let events = nested(IdAccessor::field("match_id"), "1", "events")(&state).unwrap();
        assert_eq!(events, json!([{"minute": 12, "type": "goal"}]));

        let minute = nested(IdAccessor::field("match_id"), "1", "/events/0/minute")(&state);
        assert_eq!(minute, Some(json!(12)));
    }

    #[test]
    fn test_pointer_accessor() {
        let state = Arc::new(json!({"a": {"meta": {"id": "x"}, "v": 1}}));
        let found = by_id(IdAccessor::Pointer("/meta/id".into()), "x")(&state).unwrap();
        assert_eq!(found["v"], 1);
    }

    #[test]
    fn test_typed_entities_skip_undecodable() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Fixture {
            match_id: String,
            status: String,
        }

        let state = fixtures();
        let all = entities::<Fixture>()(&state);
        assert_eq!(
            all,
            vec![Fixture {
                match_id: "1".into(),
                status: "1st Half".into()
            }]
        );

        let one = entity::<Fixture>(IdAccessor::field("match_id"), "1")(&state).unwrap();
        assert_eq!(one.status, "1st Half");
    }

    #[test]
    fn test_scalar_state_has_no_records() {
        let state = Arc::new(json!(7));
        assert!(by_id(IdAccessor::default(), "7")(&state).is_none());
        assert!(entities::<Value>()(&state).is_empty());
    }
}
