//! Localized text carried by widget statuses
//!
//! The engine never resolves translations itself. Error messages travel
//! unresolved inside [`WidgetStatus`](crate::WidgetStatus) and are turned
//! into display strings by whoever renders them, through a [`Translator`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A user-facing message in one of the forms survey authors write
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalizedText {
    /// Literal text, identical in every language
    Plain(String),
    /// Text per language code
    ByLanguage(BTreeMap<String, String>),
    /// A translation key with interpolation parameters
    Key {
        key: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        params: BTreeMap<String, String>,
    },
}

impl LocalizedText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain(text.into())
    }

    pub fn key(key: impl Into<String>) -> Self {
        Self::Key {
            key: key.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        match self {
            Self::Key { key, mut params } => {
                params.insert(name.into(), value.into());
                Self::Key { key, params }
            }
            other => other,
        }
    }

    /// Resolve to a display string for `language`.
    ///
    /// Per-language text falls back to the first available language; a
    /// key the translator does not know resolves to the key itself.
    pub fn resolve(&self, language: &str, translator: &dyn Translator) -> String {
        match self {
            Self::Plain(text) => text.clone(),
            Self::ByLanguage(texts) => texts
                .get(language)
                .or_else(|| texts.values().next())
                .cloned()
                .unwrap_or_default(),
            Self::Key { key, params } => translator
                .translate(key, params, language)
                .unwrap_or_else(|| key.clone()),
        }
    }
}

impl From<&str> for LocalizedText {
    fn from(text: &str) -> Self {
        Self::plain(text)
    }
}

impl From<String> for LocalizedText {
    fn from(text: String) -> Self {
        Self::Plain(text)
    }
}

/// Call contract into the host application's translation catalog
pub trait Translator {
    fn translate(&self, key: &str, params: &BTreeMap<String, String>, language: &str) -> Option<String>;
}
