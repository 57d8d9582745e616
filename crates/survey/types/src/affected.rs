//! What an edit touched, and what a pass wrote back

use crate::ResponseTree;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// The response paths a pass is specifically about
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffectedPaths {
    /// Every path; used once, when the respondent submits the section
    All,
    Paths(BTreeSet<String>),
}

impl AffectedPaths {
    pub fn none() -> Self {
        Self::Paths(BTreeSet::new())
    }

    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Paths(paths.into_iter().map(Into::into).collect())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Whether `path` is affected, the wildcard included
    pub fn contains(&self, path: &str) -> bool {
        match self {
            Self::All => true,
            Self::Paths(paths) => paths.contains(path),
        }
    }

    pub fn insert(&mut self, path: impl Into<String>) {
        if let Self::Paths(paths) = self {
            paths.insert(path.into());
        }
    }
}

impl Default for AffectedPaths {
    fn default() -> Self {
        Self::none()
    }
}

/// Path → value writes. `None` records an unset.
///
/// Values are kept exactly as written: a `null` fallback is recorded as
/// `null`, not folded into an unset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueDiff {
    entries: BTreeMap<String, Option<Value>>,
}

impl ValueDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<String>, value: Value) -> Self {
        self.record(path, Some(value));
        self
    }

    /// Record a write, replacing any earlier write to the same path
    pub fn record(&mut self, path: impl Into<String>, value: Option<Value>) {
        self.entries.insert(path.into(), value);
    }

    /// The recorded write for `path`: `Some(None)` is an unset
    pub fn get(&self, path: &str) -> Option<Option<&Value>> {
        self.entries.get(path).map(Option::as_ref)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold `other` into this diff; later writes win
    pub fn merge(&mut self, other: ValueDiff) {
        self.entries.extend(other.entries);
    }

    /// Write every entry into `tree`
    pub fn apply_to(&self, tree: &mut ResponseTree) {
        for (path, value) in &self.entries {
            tree.set(path, value.clone());
        }
    }
}

/// Path → validity for every path whose validity changed in a pass
pub type ValidityDiff = BTreeMap<String, bool>;
