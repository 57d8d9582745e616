//! Response tree: the authoritative, mutable interview state
//!
//! Paths are dot-separated keys (`household.persons.p1.age`). Reading a
//! response treats a stored `null` like an absent key, the same way a
//! respondent sees an unanswered question. Writing `None` removes the key.

use crate::PathTemplateError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Nested mapping holding every response of one interview
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseTree {
    root: Map<String, Value>,
}

impl ResponseTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from a JSON value. Anything other than an object yields
    /// an empty tree.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(root) => Self { root },
            _ => Self::default(),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.root)
    }

    /// Raw value stored at `path`, `null` included
    pub fn get(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return None;
        }
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Response at `path`, with `null` read as absent
    pub fn response(&self, path: &str) -> Option<&Value> {
        self.get(path).filter(|v| !v.is_null())
    }

    /// Write `value` at `path`, creating intermediate objects. `None`
    /// removes the key.
    pub fn set(&mut self, path: &str, value: Option<Value>) {
        if path.is_empty() {
            return;
        }
        let Some(value) = value else {
            self.unset(path);
            return;
        };
        let segments: Vec<&str> = path.split('.').collect();
        let (last, parents) = match segments.split_last() {
            Some(split) => split,
            None => return,
        };
        let mut current = &mut self.root;
        for segment in parents {
            let entry = current
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            current = match entry {
                Value::Object(map) => map,
                _ => return,
            };
        }
        current.insert((*last).to_string(), value);
    }

    /// Remove the key at `path`. Missing parents are left untouched.
    pub fn unset(&mut self, path: &str) -> Option<Value> {
        let segments: Vec<&str> = path.split('.').collect();
        let (last, parents) = segments.split_last()?;
        let mut current = &mut self.root;
        for segment in parents {
            current = match current.get_mut(*segment)? {
                Value::Object(map) => map,
                _ => return None,
            };
        }
        current.remove(*last)
    }
}

impl From<Value> for ResponseTree {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

/// Join a parent path and a relative path
pub fn join_path(parent: &str, relative: &str) -> String {
    match (parent.is_empty(), relative.is_empty()) {
        (true, _) => relative.to_string(),
        (false, true) => parent.to_string(),
        (false, false) => format!("{}.{}", parent, relative),
    }
}

/// Replace every `{some.path}` token in `template` by the scalar response
/// stored at that path.
pub fn interpolate_path(tree: &ResponseTree, template: &str) -> Result<String, PathTemplateError> {
    let mut resolved = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;
    while let Some(open) = rest.find('{') {
        resolved.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or(PathTemplateError::Unclosed(offset + open))?;
        let token = after[..close].trim();
        if token.is_empty() {
            return Err(PathTemplateError::EmptyToken(offset + open));
        }
        match tree.response(token) {
            Some(Value::String(s)) => resolved.push_str(s),
            Some(Value::Number(n)) => resolved.push_str(&n.to_string()),
            Some(Value::Bool(b)) => resolved.push_str(if *b { "true" } else { "false" }),
            _ => return Err(PathTemplateError::Unresolved(token.to_string())),
        }
        let consumed = open + 1 + close + 1;
        offset += consumed;
        rest = &rest[consumed..];
    }
    resolved.push_str(rest);
    Ok(resolved)
}

/// Whether a value counts as unanswered: absent, `null`, a blank string,
/// or an empty array or object.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(Value::Bool(_)) | Some(Value::Number(_)) => false,
    }
}

/// Equality where `null` and absent are interchangeable
pub fn values_equivalent(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
