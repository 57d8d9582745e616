//! Widget registry: stores widget definitions and section layouts
//!
//! The registry is handed to the reconciler explicitly on every pass. It
//! is immutable while passes run; register everything up front and call
//! [`WidgetRegistry::validate`] once the configuration is complete.

use std::collections::HashMap;
use survey_types::{ReconcileError, ReconcileResult, WidgetDefinition};

/// Registry of widget definitions, keyed by widget name
#[derive(Clone, Debug, Default)]
pub struct WidgetRegistry {
    /// All registered widgets
    widgets: HashMap<String, WidgetDefinition>,
    /// Section name → ordered top-level widget names
    sections: HashMap<String, Vec<String>>,
}

impl WidgetRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a widget definition
    ///
    /// Group definitions are checked for shape here; references to other
    /// widgets are checked by [`validate`](Self::validate).
    pub fn register(
        &mut self,
        name: impl Into<String>,
        definition: impl Into<WidgetDefinition>,
    ) -> ReconcileResult<()> {
        let name = name.into();
        let definition = definition.into();
        if self.widgets.contains_key(&name) {
            return Err(ReconcileError::DuplicateWidget(name));
        }
        if let WidgetDefinition::Group(group) = &definition {
            if group.path.trim().is_empty() {
                return Err(ReconcileError::MalformedGroup {
                    group: name,
                    reason: "empty collection path".to_string(),
                });
            }
            if group.widgets.is_empty() {
                return Err(ReconcileError::MalformedGroup {
                    group: name,
                    reason: "no member widgets".to_string(),
                });
            }
            if group.widgets.iter().any(|member| member == &name) {
                return Err(ReconcileError::MalformedGroup {
                    group: name,
                    reason: "group contains itself".to_string(),
                });
            }
        }

        tracing::debug!(widget = %name, kind = %definition.kind(), "Widget registered");
        self.widgets.insert(name, definition);
        Ok(())
    }

    /// Register the ordered top-level widgets of a section
    pub fn register_section<I, S>(&mut self, name: impl Into<String>, widgets: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let widgets: Vec<String> = widgets.into_iter().map(Into::into).collect();
        tracing::info!(section = %name, widgets = widgets.len(), "Section registered");
        self.sections.insert(name, widgets);
    }

    /// Get a widget definition by name
    pub fn get(&self, name: &str) -> ReconcileResult<&WidgetDefinition> {
        self.widgets
            .get(name)
            .ok_or_else(|| ReconcileError::UnknownWidget(name.to_string()))
    }

    /// Ordered top-level widgets of a section
    pub fn section(&self, name: &str) -> ReconcileResult<&[String]> {
        self.sections
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ReconcileError::UnknownSection(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.widgets.contains_key(name)
    }

    /// Total number of registered widgets
    pub fn count(&self) -> usize {
        self.widgets.len()
    }

    /// Check that every section and group member reference resolves, and
    /// that no group is nested inside itself.
    pub fn validate(&self) -> ReconcileResult<()> {
        for widgets in self.sections.values() {
            for name in widgets {
                self.get(name)?;
            }
        }
        for name in self.widgets.keys() {
            self.check_group_nesting(name, &mut Vec::new())?;
        }
        Ok(())
    }

    fn check_group_nesting<'a>(&'a self, name: &'a str, stack: &mut Vec<&'a str>) -> ReconcileResult<()> {
        let WidgetDefinition::Group(group) = self.get(name)? else {
            return Ok(());
        };
        if stack.contains(&name) {
            return Err(ReconcileError::MalformedGroup {
                group: name.to_string(),
                reason: "group is nested inside itself".to_string(),
            });
        }
        stack.push(name);
        for member in &group.widgets {
            self.check_group_nesting(member, stack)?;
        }
        stack.pop();
        Ok(())
    }
}
