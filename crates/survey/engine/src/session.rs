//! Interview session: the main entry point for the survey engine
//!
//! The session owns one respondent's response tree and the widget statuses
//! of the last update. For every edit it:
//! 1. Applies the edited values and unsets to the tree
//! 2. Derives the affected paths from the edit
//! 3. Runs reconcile passes until the section settles
//! 4. Returns everything the caller must persist or re-render
//!
//! A failed update leaves both the tree and the statuses untouched.

use crate::{PassInput, Reconciler, ReconcilerConfig, WidgetRegistry};
use serde_json::Value;
use std::sync::Arc;
use survey_types::*;

/// One respondent edit
#[derive(Clone, Debug, Default)]
pub struct SectionEdit {
    /// Values to write, by response path
    pub values: ValueDiff,
    /// Response paths to remove
    pub unset_paths: Vec<String>,
    /// Validate every widget, e.g. when the respondent submits the section
    pub validate_all: bool,
    /// Re-render the edited widgets even if their values did not change
    pub force_update_key_bump: bool,
}

impl SectionEdit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Edit of a single response
    pub fn set(path: impl Into<String>, value: Value) -> Self {
        Self::new().with_value(path, value)
    }

    /// A submission: nothing changes but every widget is validated
    pub fn submit() -> Self {
        Self {
            validate_all: true,
            ..Self::default()
        }
    }

    pub fn with_value(mut self, path: impl Into<String>, value: Value) -> Self {
        self.values.record(path, Some(value));
        self
    }

    pub fn with_unset(mut self, path: impl Into<String>) -> Self {
        self.unset_paths.push(path.into());
        self
    }

    pub fn with_update_key_bump(mut self) -> Self {
        self.force_update_key_bump = true;
        self
    }

    fn affected_paths(&self) -> AffectedPaths {
        if self.validate_all {
            return AffectedPaths::All;
        }
        let mut affected = AffectedPaths::none();
        for path in self.values.paths() {
            affected.insert(path);
        }
        for path in &self.unset_paths {
            affected.insert(path.as_str());
        }
        affected
    }
}

/// What a section update produced
#[derive(Clone, Debug, Default)]
pub struct SectionUpdate {
    /// The edit plus every write of the engine; `None` means unset
    pub value_diff: ValueDiff,
    pub validity_diff: ValidityDiff,
    /// Passes run
    pub rounds: u32,
    /// Whether the last pass stopped writing
    pub settled: bool,
    pub all_widgets_valid: bool,
    pub modal_open: bool,
    pub visible_paths: Vec<String>,
}

/// One respondent's interview
#[derive(Clone, Debug)]
pub struct InterviewSession {
    registry: Arc<WidgetRegistry>,
    reconciler: Reconciler,
    tree: ResponseTree,
    /// Statuses of the last successful update, per section
    statuses: std::collections::HashMap<String, SectionStatus>,
    user: Option<InterviewUser>,
}

impl InterviewSession {
    /// Create a session over a validated registry
    pub fn new(
        registry: Arc<WidgetRegistry>,
        config: ReconcilerConfig,
        tree: ResponseTree,
    ) -> ReconcileResult<Self> {
        config.validate()?;
        registry.validate()?;
        Ok(Self {
            registry,
            reconciler: Reconciler::new(config),
            tree,
            statuses: std::collections::HashMap::new(),
            user: None,
        })
    }

    pub fn with_user(mut self, user: InterviewUser) -> Self {
        self.user = Some(user);
        self
    }

    pub fn tree(&self) -> &ResponseTree {
        &self.tree
    }

    pub fn into_tree(self) -> ResponseTree {
        self.tree
    }

    /// Statuses of the last update of `section`
    pub fn status(&self, section: &str) -> Option<&SectionStatus> {
        self.statuses.get(section)
    }

    /// Apply `edit` and reconcile `section` until it settles.
    ///
    /// Each pass sees the statuses of the pass before it, so a default
    /// written in one pass can reveal or hide widgets in the next.
    pub fn update_section(&mut self, section: &str, edit: SectionEdit) -> ReconcileResult<SectionUpdate> {
        let widgets = self.registry.section(section)?;
        let snapshot = self.tree.clone();

        for path in &edit.unset_paths {
            self.tree.unset(path);
        }
        edit.values.apply_to(&mut self.tree);
        let affected = edit.affected_paths();

        let mut pending = edit.values.clone();
        for path in &edit.unset_paths {
            pending.record(path.as_str(), None);
        }

        let mut previous = self.statuses.get(section).cloned().unwrap_or_default();
        let mut update = SectionUpdate::default();
        let max_rounds = self.reconciler.config().max_rounds;

        loop {
            let input = PassInput::new(widgets, &affected, &previous)
                .with_user(self.user.as_ref())
                .with_update_key_bump(edit.force_update_key_bump && update.rounds == 0);
            let outcome = match self.reconciler.reconcile(&self.registry, input, pending, &mut self.tree) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(section = %section, error = %e, "Section update failed, restoring responses");
                    self.tree = snapshot;
                    return Err(e);
                }
            };
            update.rounds += 1;
            for (path, valid) in outcome.validity_diff {
                update.validity_diff.insert(path, valid);
            }
            update.all_widgets_valid = outcome.all_widgets_valid;
            update.modal_open = outcome.modal_open;
            update.visible_paths = outcome.visible_paths;
            pending = outcome.value_diff;
            previous = outcome.status;

            if !outcome.needs_another_round {
                update.settled = true;
                break;
            }
            if update.rounds >= max_rounds {
                tracing::warn!(
                    section = %section,
                    rounds = update.rounds,
                    "Section did not settle, keeping last pass"
                );
                break;
            }
        }

        update.value_diff = pending;
        tracing::info!(
            section = %section,
            rounds = update.rounds,
            writes = update.value_diff.len(),
            valid = update.all_widgets_valid,
            "Section updated"
        );
        self.statuses.insert(section.to_string(), previous);
        Ok(update)
    }
}
