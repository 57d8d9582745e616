//! Widget statuses: the display state produced by one reconcile pass

use crate::LocalizedText;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Display state of one widget instance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetStatus {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_path: Option<String>,
    pub is_visible: bool,
    pub is_disabled: bool,
    pub is_collapsed: bool,
    pub modal_is_open: bool,
    pub is_empty: bool,
    pub is_custom_empty: bool,
    pub is_valid: bool,
    /// A response is stored, `null` included
    pub is_responded: bool,
    pub is_custom_responded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<LocalizedText>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouped_object_id: Option<String>,
    /// Bumped whenever the displayed value changed for a reason other than
    /// the respondent's own edit, so renderers drop stale input state.
    pub current_update_key: u64,
}

impl WidgetStatus {
    /// Status of a widget that shows nothing and holds nothing
    pub fn hidden(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            custom_path: None,
            is_visible: false,
            is_disabled: false,
            is_collapsed: false,
            modal_is_open: false,
            is_empty: true,
            is_custom_empty: true,
            is_valid: true,
            is_responded: false,
            is_custom_responded: false,
            error_message: None,
            value: None,
            custom_value: None,
            grouped_object_id: None,
            current_update_key: 0,
        }
    }
}

/// Statuses of one instance of a group
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInstanceStatus {
    pub grouped_object_id: String,
    pub widgets: HashMap<String, WidgetStatus>,
}

/// Every status produced for a section.
///
/// Top-level widgets are keyed by name. Group members are keyed by group
/// name, then grouped object id (instances kept in collection order), then
/// widget name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionStatus {
    pub widgets: HashMap<String, WidgetStatus>,
    pub groups: HashMap<String, Vec<GroupInstanceStatus>>,
}

impl SectionStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn widget(&self, name: &str) -> Option<&WidgetStatus> {
        self.widgets.get(name)
    }

    /// Ordered instances of a group
    pub fn group_instances(&self, group: &str) -> &[GroupInstanceStatus] {
        self.groups.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn group_widget(&self, group: &str, object_id: &str, name: &str) -> Option<&WidgetStatus> {
        self.group_instances(group)
            .iter()
            .find(|instance| instance.grouped_object_id == object_id)
            .and_then(|instance| instance.widgets.get(name))
    }

    /// Look up a status wherever it lives: in a group instance when `group`
    /// is given, at the top level otherwise.
    pub fn lookup(&self, group: Option<(&str, &str)>, name: &str) -> Option<&WidgetStatus> {
        match group {
            Some((group, object_id)) => self.group_widget(group, object_id, name),
            None => self.widget(name),
        }
    }

    pub fn insert(&mut self, group: Option<(&str, &str)>, name: impl Into<String>, status: WidgetStatus) {
        match group {
            Some((group, object_id)) => {
                let instances = self.groups.entry(group.to_string()).or_default();
                let position = instances
                    .iter()
                    .position(|instance| instance.grouped_object_id == object_id);
                let instance = match position {
                    Some(i) => &mut instances[i],
                    None => {
                        instances.push(GroupInstanceStatus {
                            grouped_object_id: object_id.to_string(),
                            widgets: HashMap::new(),
                        });
                        let last = instances.len() - 1;
                        &mut instances[last]
                    }
                };
                instance.widgets.insert(name.into(), status);
            }
            None => {
                self.widgets.insert(name.into(), status);
            }
        }
    }

    /// Every status, top-level widgets first, then group members
    pub fn iter(&self) -> impl Iterator<Item = &WidgetStatus> {
        self.widgets.values().chain(
            self.groups
                .values()
                .flat_map(|instances| instances.iter().flat_map(|i| i.widgets.values())),
        )
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty() && self.groups.is_empty()
    }
}
