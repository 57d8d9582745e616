//! Group expander: ordered instances of a repeatable group

use serde_json::{Map, Value};
use survey_types::{GroupFilterFn, ReconcileError, ReconcileResult, ResponseTree};

/// One object of a group's backing collection
#[derive(Clone, Debug, PartialEq)]
pub struct GroupedObject {
    /// `_uuid` of the object, or its key in the collection
    pub id: String,
    pub sequence: Option<i64>,
    pub data: Value,
}

/// Enumerates group instances in `_sequence` order
#[derive(Clone, Debug, Default)]
pub struct GroupExpander;

impl GroupExpander {
    pub fn new() -> Self {
        Self
    }

    /// Instances of the collection at `path`, narrowed by `filter` and
    /// sorted by `_sequence` (stable; objects without one come last).
    ///
    /// A missing collection has no instances. A collection that is not an
    /// object is an error naming `widget`.
    pub fn instances(
        &self,
        widget: &str,
        tree: &ResponseTree,
        path: &str,
        filter: Option<&GroupFilterFn>,
    ) -> ReconcileResult<Vec<GroupedObject>> {
        let empty = Map::new();
        let collection = match tree.response(path) {
            None => &empty,
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(ReconcileError::InvalidGroupCollection {
                    widget: widget.to_string(),
                    path: path.to_string(),
                })
            }
        };

        let filtered;
        let collection = match filter {
            Some(filter) => match filter(tree, collection) {
                Ok(narrowed) => {
                    filtered = narrowed;
                    &filtered
                }
                Err(e) => {
                    tracing::warn!(group = %widget, path = %path, error = %e, "Group filter failed, using whole collection");
                    collection
                }
            },
            None => collection,
        };

        let mut objects: Vec<GroupedObject> = collection
            .iter()
            .map(|(key, data)| GroupedObject {
                id: data
                    .get("_uuid")
                    .and_then(Value::as_str)
                    .unwrap_or(key)
                    .to_string(),
                sequence: data.get("_sequence").and_then(Value::as_i64),
                data: data.clone(),
            })
            .collect();
        objects.sort_by_key(|object| (object.sequence.is_none(), object.sequence));
        Ok(objects)
    }
}
