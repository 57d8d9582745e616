//! Reconciler: recomputes every widget status of a section in one pass
//!
//! A pass walks the section's widgets depth-first in declaration order,
//! expanding groups once per grouped object. Each question is evaluated
//! against the tree as left by the widgets before it, so defaults and
//! resets written earlier in the pass are visible to later conditionals.
//!
//! The pass is synchronous and owns the tree exclusively for its duration.
//! It never fails because of a single widget's strategy: evaluator faults
//! are logged and recovered where they happen. Only unresolvable paths and
//! configuration defects abort it.

use crate::choices::ChoiceVisibilityEvaluator;
use crate::conditional::ConditionalEvaluator;
use crate::groups::GroupExpander;
use crate::registry::WidgetRegistry;
use crate::validation::ValidationEvaluator;
use crate::ReconcilerConfig;
use serde_json::Value;
use survey_types::*;

/// Everything a pass reads besides the tree
#[derive(Clone, Copy, Debug)]
pub struct PassInput<'a> {
    /// Ordered top-level widgets of the section
    pub widgets: &'a [String],
    /// Path the section's widget paths are relative to
    pub parent_path: &'a str,
    pub affected: &'a AffectedPaths,
    /// Statuses of the previous pass
    pub previous: &'a SectionStatus,
    /// Bump the update key of the affected widgets, e.g. after a server
    /// correction of what the respondent typed
    pub force_update_key_bump: bool,
    pub user: Option<&'a InterviewUser>,
}

impl<'a> PassInput<'a> {
    pub fn new(widgets: &'a [String], affected: &'a AffectedPaths, previous: &'a SectionStatus) -> Self {
        Self {
            widgets,
            parent_path: "",
            affected,
            previous,
            force_update_key_bump: false,
            user: None,
        }
    }

    pub fn with_parent_path(mut self, parent_path: &'a str) -> Self {
        self.parent_path = parent_path;
        self
    }

    pub fn with_user(mut self, user: Option<&'a InterviewUser>) -> Self {
        self.user = user;
        self
    }

    pub fn with_update_key_bump(mut self, bump: bool) -> Self {
        self.force_update_key_bump = bump;
        self
    }
}

/// What a pass produced
#[derive(Clone, Debug, Default)]
pub struct PassOutcome {
    pub status: SectionStatus,
    /// The pending diff handed in, plus every write of this pass
    pub value_diff: ValueDiff,
    pub validity_diff: ValidityDiff,
    /// Response paths of visible questions, in walk order
    pub visible_paths: Vec<String>,
    pub all_widgets_valid: bool,
    pub modal_open: bool,
    /// The pass wrote to the tree; run another one to settle dependents
    pub needs_another_round: bool,
}

/// Where in the walk a widget sits
#[derive(Clone, Debug)]
struct Frame<'a> {
    parent_path: String,
    /// Enclosing group name and grouped object id
    group: Option<(&'a str, String)>,
}

impl Frame<'_> {
    fn group_key(&self) -> Option<(&str, &str)> {
        self.group.as_ref().map(|(name, id)| (*name, id.as_str()))
    }

    fn grouped_object_id(&self) -> Option<String> {
        self.group.as_ref().map(|(_, id)| id.clone())
    }
}

/// Mutable state of one pass
struct PassState<'t> {
    tree: &'t mut ResponseTree,
    outcome: PassOutcome,
}

impl PassState<'_> {
    fn write(&mut self, path: &str, value: Option<Value>) {
        self.tree.set(path, value.clone());
        self.outcome.value_diff.record(path, value);
        self.outcome.needs_another_round = true;
    }

    /// The first visible modal of the pass claims the open modal
    fn claim_modal(&mut self) -> bool {
        if self.outcome.modal_open {
            false
        } else {
            self.outcome.modal_open = true;
            true
        }
    }

    fn mark_visible(&mut self, path: &str, custom_path: Option<&str>) {
        if !path.is_empty() {
            self.outcome.visible_paths.push(path.to_string());
        }
        if let Some(custom_path) = custom_path {
            self.outcome.visible_paths.push(custom_path.to_string());
        }
    }
}

/// The reconcile engine
#[derive(Clone, Debug, Default)]
pub struct Reconciler {
    config: ReconcilerConfig,
    conditionals: ConditionalEvaluator,
    choices: ChoiceVisibilityEvaluator,
    validations: ValidationEvaluator,
    groups: GroupExpander,
}

impl Reconciler {
    pub fn new(config: ReconcilerConfig) -> Self {
        let conditionals = ConditionalEvaluator::new();
        Self {
            config,
            choices: ChoiceVisibilityEvaluator::new(conditionals.clone()),
            conditionals,
            validations: ValidationEvaluator::new(),
            groups: GroupExpander::new(),
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Run one pass over `input.widgets`, mutating `tree` in place.
    ///
    /// `pending` holds the edit's writes, already applied to `tree` by the
    /// caller; it is returned in [`PassOutcome::value_diff`] augmented with
    /// this pass's own writes.
    pub fn reconcile(
        &self,
        registry: &WidgetRegistry,
        input: PassInput<'_>,
        pending: ValueDiff,
        tree: &mut ResponseTree,
    ) -> ReconcileResult<PassOutcome> {
        let mut state = PassState {
            tree,
            outcome: PassOutcome {
                value_diff: pending,
                all_widgets_valid: true,
                ..Default::default()
            },
        };
        let frame = Frame {
            parent_path: input.parent_path.to_string(),
            group: None,
        };
        self.walk(registry, &input, &mut state, input.widgets, &frame)?;
        Ok(state.outcome)
    }

    fn walk<'r>(
        &self,
        registry: &'r WidgetRegistry,
        input: &PassInput<'_>,
        state: &mut PassState<'_>,
        widgets: &'r [String],
        frame: &Frame<'r>,
    ) -> ReconcileResult<()> {
        for name in widgets {
            match registry.get(name)? {
                WidgetDefinition::Group(group) => {
                    let path = resolve_path(state.tree, name, &group.path, &frame.parent_path)?;
                    let objects = self
                        .groups
                        .instances(name, state.tree, &path, group.filter.as_deref())?;
                    for object in objects {
                        let child = Frame {
                            parent_path: join_path(&path, &object.id),
                            group: Some((name.as_str(), object.id)),
                        };
                        self.walk(registry, input, state, &group.widgets, &child)?;
                    }
                }
                WidgetDefinition::Question(question) => {
                    self.reconcile_question(input, state, name, question, frame)?;
                }
                WidgetDefinition::Text(info) | WidgetDefinition::Button(info) => {
                    self.reconcile_info(input, state, name, info, frame);
                }
            }
        }
        Ok(())
    }

    /// Text and buttons: visibility only
    fn reconcile_info(
        &self,
        input: &PassInput<'_>,
        state: &mut PassState<'_>,
        name: &str,
        info: &InfoWidget,
        frame: &Frame<'_>,
    ) {
        let scope = EvalScope::new(state.tree, "").with_user(input.user);
        let visibility = self.conditionals.evaluate(info.conditional.as_ref(), &scope);
        let previous_key = input
            .previous
            .lookup(frame.group_key(), name)
            .map_or(0, |s| s.current_update_key);

        let mut status = WidgetStatus::hidden("");
        status.is_visible = visibility.visible;
        status.grouped_object_id = frame.grouped_object_id();
        status.current_update_key = previous_key;
        state.outcome.status.insert(frame.group_key(), name, status);
    }

    fn reconcile_question(
        &self,
        input: &PassInput<'_>,
        state: &mut PassState<'_>,
        name: &str,
        question: &QuestionWidget,
        frame: &Frame<'_>,
    ) -> ReconcileResult<()> {
        let path = resolve_path(state.tree, name, &question.path, &frame.parent_path)?;
        let custom_path = question
            .custom_path
            .as_deref()
            .map(|template| resolve_path(state.tree, name, template, &frame.parent_path))
            .transpose()?;
        let previous = input
            .previous
            .lookup(frame.group_key(), name)
            .filter(|status| status.path == path);
        let affected = input.affected.contains(&path)
            || custom_path.as_deref().map_or(false, |p| input.affected.contains(p));

        // Visibility, and repair of selected choices that became hidden
        let scope = EvalScope::new(state.tree, &path)
            .with_custom_path(custom_path.as_deref())
            .with_user(input.user);
        let visibility = self.conditionals.evaluate(question.conditional.as_ref(), &scope);
        let mut assigned = visibility.fallback.clone();
        let custom_assigned = visibility.custom_fallback.clone();
        // A stored null is a response; only an absent key is unanswered
        let mut value = state.tree.get(&path).cloned();
        let mut choices_visible = true;
        if visibility.visible {
            if let Some(choices) = &question.choices {
                let check = self.choices.evaluate(value.as_ref(), choices, &scope);
                if !check.all_visible {
                    assigned = check.adjusted;
                    choices_visible = false;
                }
            }
        }

        // Nothing this widget depends on can have changed: keep its status
        if let Some(previous) = previous {
            if !affected
                && previous.is_visible
                && visibility.visible
                && assigned.is_none()
                && custom_assigned.is_none()
                && choices_visible
            {
                let mut status = previous.clone();
                if question.is_modal {
                    status.modal_is_open = state.claim_modal();
                }
                if !status.is_valid {
                    state.outcome.all_widgets_valid = false;
                }
                tracing::trace!(path = %path, "Widget status unchanged");
                state.mark_visible(&path, custom_path.as_deref());
                state.outcome.status.insert(frame.group_key(), name, status);
                return Ok(());
            }
        }

        let mut custom_value = custom_path
            .as_deref()
            .and_then(|p| state.tree.get(p).cloned());
        value = coerce_value(value, question.datatype, question.input_type.has_array_value());
        custom_value = coerce_value(custom_value, question.custom_datatype, false);

        let mut visible_value_updated = false;
        let mut is_responded = value.is_some() || input.affected.is_all();
        let mut is_custom_responded = custom_value.is_some() || input.affected.is_all();
        let became_visible = previous.map_or(false, |p| !p.is_visible);

        // Defaults
        if visibility.visible
            && (became_visible
                || value.is_none()
                || (question.update_default_value_when_responded
                    && !self.is_live_interaction(question, value.as_ref())))
        {
            let default = if question.use_assigned_value_on_hide && !is_blank(assigned.as_ref()) {
                Some(assigned.clone())
            } else {
                self.resolve_default(question.default_value.as_ref(), state.tree, &path, input.user)
            };
            if let Some(default) = default {
                if !values_equivalent(default.as_ref(), state.tree.get(&path)) {
                    tracing::debug!(path = %path, "Applying default value");
                    state.write(&path, default.clone());
                    is_responded = !is_blank(default.as_ref());
                    value = default;
                    visible_value_updated = true;
                }
            }
        }
        if let Some(custom_path) = custom_path.as_deref() {
            if visibility.visible && (became_visible || custom_value.is_none()) {
                let default = self.resolve_default(
                    question.custom_default_value.as_ref(),
                    state.tree,
                    &path,
                    input.user,
                );
                if let Some(default) = default {
                    if !values_equivalent(default.as_ref(), state.tree.get(custom_path)) {
                        tracing::debug!(path = %custom_path, "Applying custom default value");
                        state.write(custom_path, default.clone());
                        is_custom_responded = !is_blank(default.as_ref());
                        custom_value = default;
                        visible_value_updated = true;
                    }
                }
            }
        }

        // The custom box was just revealed: do not flag it before it is filled
        if !input.affected.is_all() && custom_path.is_some() {
            if let (Some(sentinel), Some(previous)) = (&question.custom_choice, previous) {
                if !selects(previous.value.as_ref(), sentinel) && selects(value.as_ref(), sentinel) {
                    is_responded = false;
                    is_custom_responded = false;
                }
            }
        }

        // Hidden widgets and pruned choices take their assigned values
        if (!visibility.visible || !choices_visible)
            && !values_equivalent(assigned.as_ref(), state.tree.response(&path))
        {
            tracing::debug!(path = %path, from = ?value, to = ?assigned, "Assigning value");
            state.write(&path, assigned.clone());
            value = assigned;
            visible_value_updated |= visibility.visible && !choices_visible;
        }
        if let Some(custom_path) = custom_path.as_deref() {
            if !visibility.visible && !values_equivalent(custom_assigned.as_ref(), state.tree.response(custom_path)) {
                tracing::debug!(path = %custom_path, "Assigning custom value");
                state.write(custom_path, custom_assigned.clone());
                custom_value = custom_assigned;
            }
        }

        let modal_is_open = question.is_modal && visibility.visible && state.claim_modal();

        // Validity only changes when the respondent touched the widget
        let (mut is_valid, mut error_message) = if visibility.visible {
            let outcome = self.validations.evaluate(
                question.validations.as_ref(),
                &ValidationScope {
                    value: value.as_ref(),
                    custom_value: custom_value.as_ref(),
                    tree: state.tree,
                    path: &path,
                    custom_path: custom_path.as_deref(),
                },
            );
            (outcome.is_valid, outcome.error_message)
        } else {
            (true, None)
        };
        let previous_valid = previous.map(|p| p.is_valid);
        if visibility.visible && !affected {
            let prior = previous_valid.unwrap_or(true);
            if is_valid != prior {
                is_valid = prior;
                error_message = None;
            }
        }
        if previous_valid != Some(is_valid) {
            state.outcome.validity_diff.insert(path.clone(), is_valid);
            if let Some(custom_path) = &custom_path {
                state.outcome.validity_diff.insert(custom_path.clone(), is_valid);
            }
        }
        if !is_valid && visibility.visible {
            state.outcome.all_widgets_valid = false;
        }

        let bump = (input.force_update_key_bump && affected) || visible_value_updated;
        let previous_key = previous.map_or(0, |p| p.current_update_key);
        let status = WidgetStatus {
            is_empty: if custom_path.is_some() {
                is_blank(value.as_ref()) && is_blank(custom_value.as_ref())
            } else {
                is_blank(value.as_ref())
            },
            is_custom_empty: is_blank(custom_value.as_ref()),
            path,
            custom_path,
            is_visible: visibility.visible,
            is_disabled: false,
            is_collapsed: false,
            modal_is_open,
            is_valid,
            is_responded,
            is_custom_responded,
            error_message,
            value,
            custom_value,
            grouped_object_id: frame.grouped_object_id(),
            current_update_key: if bump { previous_key + 1 } else { previous_key },
        };
        if status.is_visible {
            state.mark_visible(&status.path, status.custom_path.as_deref());
        }
        state.outcome.status.insert(frame.group_key(), name, status);
        Ok(())
    }

    /// `Some(default)` to apply, `None` when the default function failed
    fn resolve_default(
        &self,
        default: Option<&DefaultValue>,
        tree: &ResponseTree,
        path: &str,
        user: Option<&InterviewUser>,
    ) -> Option<Option<Value>> {
        match default {
            None => Some(None),
            Some(DefaultValue::Literal(value)) => Some(Some(value.clone())),
            Some(DefaultValue::Computed(f)) => {
                let scope = EvalScope::new(tree, path).with_user(user);
                match f(&scope) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::warn!(path = %path, error = %e, "Default value failed, skipping");
                        None
                    }
                }
            }
        }
    }

    /// A map point the respondent is moving right now
    fn is_live_interaction(&self, question: &QuestionWidget, value: Option<&Value>) -> bool {
        if !question.input_type.is_map_point() || is_blank(value) {
            return false;
        }
        value
            .and_then(|v| v.pointer("/properties/lastAction"))
            .and_then(Value::as_str)
            .map_or(false, |action| self.config.is_live_interaction(action))
    }
}

/// Interpolate a widget's path template and join it to its parent path
fn resolve_path(tree: &ResponseTree, widget: &str, template: &str, parent: &str) -> ReconcileResult<String> {
    let relative = interpolate_path(tree, template).map_err(|source| ReconcileError::PathResolution {
        widget: widget.to_string(),
        template: template.to_string(),
        source,
    })?;
    Ok(join_path(parent, &relative))
}

/// Whether a response selects `sentinel`, as a scalar or within a sequence
fn selects(value: Option<&Value>, sentinel: &Value) -> bool {
    match value {
        Some(Value::Array(items)) => items.contains(sentinel),
        Some(value) => value == sentinel,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry(widgets: Vec<(&str, WidgetDefinition)>) -> WidgetRegistry {
        let mut registry = WidgetRegistry::new();
        for (name, definition) in widgets {
            registry.register(name, definition).unwrap();
        }
        registry
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn run(
        registry: &WidgetRegistry,
        widgets: &[String],
        tree: &mut ResponseTree,
        affected: &AffectedPaths,
        previous: &SectionStatus,
    ) -> PassOutcome {
        Reconciler::default()
            .reconcile(registry, PassInput::new(widgets, affected, previous), ValueDiff::new(), tree)
            .unwrap()
    }

    fn required() -> Validations {
        Validations::new(|scope| Ok(vec![ValidationRule::new(is_blank(scope.value), "Required")]))
    }

    #[test]
    fn test_simple_status() {
        let registry = registry(vec![("q1", QuestionWidget::new("q1").into())]);
        let mut tree = ResponseTree::from_value(json!({ "q1": "abc" }));
        let outcome = run(&registry, &names(&["q1"]), &mut tree, &AffectedPaths::none(), &SectionStatus::new());

        let status = outcome.status.widget("q1").unwrap();
        assert!(status.is_visible);
        assert!(status.is_valid);
        assert!(status.is_responded);
        assert!(!status.is_empty);
        assert_eq!(status.value, Some(json!("abc")));
        assert_eq!(status.current_update_key, 0);
        assert_eq!(outcome.visible_paths, vec!["q1"]);
        assert!(outcome.all_widgets_valid);
        assert!(!outcome.needs_another_round);
    }

    #[test]
    fn test_hidden_question_takes_fallback() {
        let question = QuestionWidget::new("q1").with_conditional(Conditional::hidden_with(json!("n/a")));
        let registry = registry(vec![("q1", question.into())]);
        let mut tree = ResponseTree::from_value(json!({ "q1": "abc" }));
        let outcome = run(&registry, &names(&["q1"]), &mut tree, &AffectedPaths::none(), &SectionStatus::new());

        assert_eq!(tree.get("q1"), Some(&json!("n/a")));
        assert_eq!(outcome.value_diff.get("q1"), Some(Some(&json!("n/a"))));
        assert!(outcome.needs_another_round);
        let status = outcome.status.widget("q1").unwrap();
        assert!(!status.is_visible);
        assert!(status.is_valid);
        assert!(outcome.visible_paths.is_empty());
        // Hiding is not a visible value change
        assert_eq!(status.current_update_key, 0);
    }

    #[test]
    fn test_null_fallback_on_unanswered_is_noop() {
        let question = QuestionWidget::new("q1").with_conditional(Conditional::hidden_with(Value::Null));
        let registry = registry(vec![("q1", question.into())]);
        let mut tree = ResponseTree::new();
        let outcome = run(&registry, &names(&["q1"]), &mut tree, &AffectedPaths::none(), &SectionStatus::new());
        assert!(outcome.value_diff.is_empty());
        assert!(!outcome.needs_another_round);
    }

    #[test]
    fn test_hidden_is_always_valid() {
        let question = QuestionWidget::new("q1")
            .with_conditional(Conditional::Literal(false))
            .with_validations(required());
        let registry = registry(vec![("q1", question.into())]);
        let mut tree = ResponseTree::new();
        let outcome = run(&registry, &names(&["q1"]), &mut tree, &AffectedPaths::All, &SectionStatus::new());
        let status = outcome.status.widget("q1").unwrap();
        assert!(status.is_valid);
        assert!(status.error_message.is_none());
        assert!(outcome.all_widgets_valid);
    }

    #[test]
    fn test_affected_widget_is_validated() {
        let registry = registry(vec![("q1", QuestionWidget::new("q1").with_validations(required()).into())]);
        let mut tree = ResponseTree::new();
        let outcome = run(
            &registry,
            &names(&["q1"]),
            &mut tree,
            &AffectedPaths::from_paths(["q1"]),
            &SectionStatus::new(),
        );
        let status = outcome.status.widget("q1").unwrap();
        assert!(!status.is_valid);
        assert_eq!(status.error_message, Some(LocalizedText::plain("Required")));
        assert!(!outcome.all_widgets_valid);
        assert_eq!(outcome.validity_diff.get("q1"), Some(&false));
    }

    #[test]
    fn test_unaffected_widget_keeps_previous_validity() {
        let registry = registry(vec![("q1", QuestionWidget::new("q1").with_validations(required()).into())]);
        let mut tree = ResponseTree::new();
        let outcome = run(&registry, &names(&["q1"]), &mut tree, &AffectedPaths::none(), &SectionStatus::new());
        let status = outcome.status.widget("q1").unwrap();
        assert!(status.is_valid);
        assert!(status.error_message.is_none());
    }

    #[test]
    fn test_default_applied_when_unanswered() {
        let question = QuestionWidget::new("q1").with_default_value(DefaultValue::Literal(json!(5)));
        let registry = registry(vec![("q1", question.into())]);
        let mut tree = ResponseTree::new();
        let outcome = run(&registry, &names(&["q1"]), &mut tree, &AffectedPaths::none(), &SectionStatus::new());

        assert_eq!(tree.get("q1"), Some(&json!(5)));
        let status = outcome.status.widget("q1").unwrap();
        assert_eq!(status.value, Some(json!(5)));
        assert!(status.is_responded);
        assert_eq!(status.current_update_key, 1);
    }

    #[test]
    fn test_null_default_leaves_stored_null_alone() {
        let question = QuestionWidget::new("q1").with_default_value(DefaultValue::Literal(Value::Null));
        let registry = registry(vec![("q1", question.into())]);
        let widgets = names(&["q1"]);

        let mut tree = ResponseTree::from_value(json!({ "q1": null }));
        let outcome = run(&registry, &widgets, &mut tree, &AffectedPaths::All, &SectionStatus::new());
        assert!(outcome.value_diff.is_empty());
        assert!(!outcome.needs_another_round);
        assert_eq!(outcome.status.widget("q1").unwrap().current_update_key, 0);

        // Absent and null are the same answer to a null default
        let mut tree = ResponseTree::new();
        let outcome = run(&registry, &widgets, &mut tree, &AffectedPaths::none(), &SectionStatus::new());
        assert!(outcome.value_diff.is_empty());
        assert!(!outcome.needs_another_round);
    }

    #[test]
    fn test_stored_null_counts_as_responded() {
        let question = QuestionWidget::new("q1").with_default_value(DefaultValue::Literal(json!(5)));
        let registry = registry(vec![("q1", question.into())]);
        let mut tree = ResponseTree::from_value(json!({ "q1": null }));
        let outcome = run(&registry, &names(&["q1"]), &mut tree, &AffectedPaths::none(), &SectionStatus::new());

        assert!(outcome.value_diff.is_empty());
        assert_eq!(tree.get("q1"), Some(&Value::Null));
        let status = outcome.status.widget("q1").unwrap();
        assert!(status.is_responded);
        assert!(status.is_empty);
    }

    fn revealed_with_fallback(fallback: Value) -> WidgetRegistry {
        let question = QuestionWidget::new("license")
            .with_conditional(Conditional::Fixed {
                visible: true,
                fallback: Some(fallback),
                custom_fallback: None,
            })
            .with_default_value(DefaultValue::Literal(json!("unknown")))
            .use_assigned_value_on_hide();
        registry(vec![("license", question.into())])
    }

    fn hidden_before(key: u64) -> SectionStatus {
        let mut previous = SectionStatus::new();
        let mut status = WidgetStatus::hidden("license");
        status.current_update_key = key;
        previous.insert(None, "license", status);
        previous
    }

    #[test]
    fn test_revealed_widget_takes_assigned_value_as_default() {
        let registry = revealed_with_fallback(json!("no"));
        let mut tree = ResponseTree::new();
        let outcome = run(&registry, &names(&["license"]), &mut tree, &AffectedPaths::none(), &hidden_before(2));

        assert_eq!(tree.get("license"), Some(&json!("no")));
        assert_eq!(outcome.value_diff.get("license"), Some(Some(&json!("no"))));
        let status = outcome.status.widget("license").unwrap();
        assert!(status.is_visible);
        assert_eq!(status.value, Some(json!("no")));
        assert_eq!(status.current_update_key, 3);
    }

    #[test]
    fn test_blank_assigned_value_falls_back_to_default() {
        let registry = revealed_with_fallback(json!(""));
        let mut tree = ResponseTree::new();
        let outcome = run(&registry, &names(&["license"]), &mut tree, &AffectedPaths::none(), &hidden_before(2));

        assert_eq!(tree.get("license"), Some(&json!("unknown")));
        assert_eq!(outcome.value_diff.get("license"), Some(Some(&json!("unknown"))));
        assert_eq!(outcome.status.widget("license").unwrap().current_update_key, 3);
    }

    #[test]
    fn test_failing_default_is_skipped() {
        let question = QuestionWidget::new("q1")
            .with_default_value(DefaultValue::computed(|_| Err(anyhow::anyhow!("no home"))));
        let registry = registry(vec![("q1", question.into())]);
        let mut tree = ResponseTree::new();
        let outcome = run(&registry, &names(&["q1"]), &mut tree, &AffectedPaths::none(), &SectionStatus::new());
        assert!(outcome.value_diff.is_empty());
        assert!(!outcome.status.widget("q1").unwrap().is_responded);
    }

    #[test]
    fn test_later_widgets_see_earlier_writes() {
        let first = QuestionWidget::new("q1").with_default_value(DefaultValue::Literal(json!("yes")));
        let second = QuestionWidget::new("q2").with_conditional(Conditional::computed(|scope| {
            Ok(json!(scope.tree.response("q1") == Some(&json!("yes"))))
        }));
        let registry = registry(vec![("q1", first.into()), ("q2", second.into())]);
        let mut tree = ResponseTree::new();
        let outcome = run(&registry, &names(&["q1", "q2"]), &mut tree, &AffectedPaths::none(), &SectionStatus::new());
        assert!(outcome.status.widget("q2").unwrap().is_visible);
    }

    #[test]
    fn test_update_default_when_responded_skips_dragged_points() {
        let question = QuestionWidget::new("home")
            .with_input_type(InputType::MapPoint)
            .with_default_value(DefaultValue::Literal(json!({ "type": "Feature", "geometry": null })))
            .update_default_when_responded();
        let registry = registry(vec![("home", question.into())]);

        let dragged = json!({ "type": "Feature", "properties": { "lastAction": "markerDragged" } });
        let mut tree = ResponseTree::from_value(json!({ "home": dragged.clone() }));
        let outcome = run(&registry, &names(&["home"]), &mut tree, &AffectedPaths::none(), &SectionStatus::new());
        assert!(outcome.value_diff.is_empty());
        assert_eq!(tree.get("home"), Some(&dragged));

        let placed = json!({ "type": "Feature", "properties": { "lastAction": "preGeocoded" } });
        let mut tree = ResponseTree::from_value(json!({ "home": placed }));
        let outcome = run(&registry, &names(&["home"]), &mut tree, &AffectedPaths::none(), &SectionStatus::new());
        assert!(outcome.value_diff.contains("home"));
    }

    #[test]
    fn test_custom_path_defaults_and_hiding() {
        let question = QuestionWidget::new("mode")
            .with_custom_path("modeOther")
            .with_custom_default_value(DefaultValue::Literal(json!("")))
            .with_conditional(Conditional::computed(|scope| Ok(json!(scope.tree.response("show").is_some()))));
        let registry = registry(vec![("mode", question.into())]);

        let mut tree = ResponseTree::from_value(json!({ "show": true }));
        let outcome = run(&registry, &names(&["mode"]), &mut tree, &AffectedPaths::none(), &SectionStatus::new());
        assert_eq!(tree.get("modeOther"), Some(&json!("")));
        assert_eq!(outcome.visible_paths, vec!["mode", "modeOther"]);

        let mut tree = ResponseTree::from_value(json!({ "mode": "other", "modeOther": "kayak" }));
        let outcome = run(&registry, &names(&["mode"]), &mut tree, &AffectedPaths::none(), &SectionStatus::new());
        // Hidden without fallback: both responses are cleared
        assert!(tree.get("mode").is_none());
        assert!(tree.get("modeOther").is_none());
        assert_eq!(outcome.value_diff.get("modeOther"), Some(None));
    }

    #[test]
    fn test_custom_choice_newly_selected_is_not_responded() {
        let question = QuestionWidget::new("mode")
            .with_custom_path("modeOther")
            .with_custom_choice("other");
        let registry = registry(vec![("mode", question.into())]);
        let widgets = names(&["mode"]);

        let mut tree = ResponseTree::from_value(json!({ "mode": "car" }));
        let first = run(&registry, &widgets, &mut tree, &AffectedPaths::none(), &SectionStatus::new());

        tree.set("mode", Some(json!("other")));
        let second = run(&registry, &widgets, &mut tree, &AffectedPaths::from_paths(["mode"]), &first.status);
        let status = second.status.widget("mode").unwrap();
        assert!(!status.is_responded);
        assert!(!status.is_custom_responded);
    }

    #[test]
    fn test_choice_pruning_bumps_update_key() {
        let question = QuestionWidget::new("mode")
            .with_input_type(InputType::Checkbox)
            .with_choices(Choices::of([
                Choice::new("a"),
                Choice::new("b").with_conditional(Conditional::computed(|scope| {
                    Ok(json!([scope.tree.response("allowB").is_some(), "x"]))
                })),
                Choice::new("x"),
            ]));
        let registry = registry(vec![("mode", question.into())]);
        let widgets = names(&["mode"]);

        let mut tree = ResponseTree::from_value(json!({ "mode": ["a", "b"], "allowB": true }));
        let first = run(&registry, &widgets, &mut tree, &AffectedPaths::none(), &SectionStatus::new());
        assert_eq!(first.status.widget("mode").unwrap().current_update_key, 0);

        tree.unset("allowB");
        let second = run(&registry, &widgets, &mut tree, &AffectedPaths::from_paths(["allowB"]), &first.status);
        assert_eq!(tree.get("mode"), Some(&json!(["a", "x"])));
        let status = second.status.widget("mode").unwrap();
        assert_eq!(status.value, Some(json!(["a", "x"])));
        assert_eq!(status.current_update_key, 1);
    }

    #[test]
    fn test_forced_update_key_bump_on_affected_only() {
        let registry = registry(vec![
            ("q1", QuestionWidget::new("q1").into()),
            ("q2", QuestionWidget::new("q2").into()),
        ]);
        let widgets = names(&["q1", "q2"]);
        let mut tree = ResponseTree::from_value(json!({ "q1": 1, "q2": 2 }));
        let affected = AffectedPaths::from_paths(["q1"]);
        let previous = SectionStatus::new();
        let outcome = Reconciler::default()
            .reconcile(
                &registry,
                PassInput::new(&widgets, &affected, &previous).with_update_key_bump(true),
                ValueDiff::new(),
                &mut tree,
            )
            .unwrap();
        assert_eq!(outcome.status.widget("q1").unwrap().current_update_key, 1);
        assert_eq!(outcome.status.widget("q2").unwrap().current_update_key, 0);
    }

    #[test]
    fn test_pending_diff_is_augmented() {
        let question = QuestionWidget::new("q2").with_default_value(DefaultValue::Literal(json!(0)));
        let registry = registry(vec![("q2", question.into())]);
        let widgets = names(&["q2"]);
        let affected = AffectedPaths::from_paths(["q1"]);
        let previous = SectionStatus::new();
        let pending = ValueDiff::new().with("q1", json!("edited"));
        let mut tree = ResponseTree::new();
        pending.apply_to(&mut tree);

        let outcome = Reconciler::default()
            .reconcile(&registry, PassInput::new(&widgets, &affected, &previous), pending, &mut tree)
            .unwrap();
        assert!(outcome.value_diff.contains("q1"));
        assert!(outcome.value_diff.contains("q2"));
    }

    #[test]
    fn test_info_widgets_report_visibility() {
        let registry = registry(vec![
            ("intro", WidgetDefinition::Text(InfoWidget::new())),
            (
                "next",
                WidgetDefinition::Button(InfoWidget::new().with_conditional(Conditional::Literal(false))),
            ),
        ]);
        let mut tree = ResponseTree::new();
        let outcome = run(&registry, &names(&["intro", "next"]), &mut tree, &AffectedPaths::All, &SectionStatus::new());
        assert!(outcome.status.widget("intro").unwrap().is_visible);
        assert!(!outcome.status.widget("next").unwrap().is_visible);
        assert!(outcome.visible_paths.is_empty());
        assert!(outcome.value_diff.is_empty());
    }

    #[test]
    fn test_path_interpolation_and_parent_path() {
        let registry = registry(vec![(
            "age",
            QuestionWidget::new("persons.{_activePersonId}.age").into(),
        )]);
        let widgets = names(&["age"]);
        let mut tree = ResponseTree::from_value(json!({
            "household": { "persons": { "p7": { "age": 51 } } },
            "_activePersonId": "p7"
        }));
        let affected = AffectedPaths::none();
        let previous = SectionStatus::new();
        let outcome = Reconciler::default()
            .reconcile(
                &registry,
                PassInput::new(&widgets, &affected, &previous).with_parent_path("household"),
                ValueDiff::new(),
                &mut tree,
            )
            .unwrap();
        let status = outcome.status.widget("age").unwrap();
        assert_eq!(status.path, "household.persons.p7.age");
        assert_eq!(status.value, Some(json!(51)));
    }

    #[test]
    fn test_unresolvable_path_aborts() {
        let registry = registry(vec![("age", QuestionWidget::new("persons.{_activePersonId}.age").into())]);
        let mut tree = ResponseTree::new();
        let result = Reconciler::default().reconcile(
            &registry,
            PassInput::new(&names(&["age"]), &AffectedPaths::none(), &SectionStatus::new()),
            ValueDiff::new(),
            &mut tree,
        );
        match result {
            Err(ReconcileError::PathResolution { widget, .. }) => assert_eq!(widget, "age"),
            other => panic!("expected a path fault, got {:?}", other.map(|o| o.status)),
        }
    }

    #[test]
    fn test_unknown_widget_aborts() {
        let registry = WidgetRegistry::new();
        let mut tree = ResponseTree::new();
        let result = Reconciler::default().reconcile(
            &registry,
            PassInput::new(&names(&["ghost"]), &AffectedPaths::none(), &SectionStatus::new()),
            ValueDiff::new(),
            &mut tree,
        );
        assert!(matches!(result, Err(ReconcileError::UnknownWidget(name)) if name == "ghost"));
    }

    #[test]
    fn test_datatype_coercion() {
        let question = QuestionWidget::new("count").with_datatype(Datatype::Integer);
        let registry = registry(vec![("count", question.into())]);
        let mut tree = ResponseTree::from_value(json!({ "count": "4" }));
        let outcome = run(&registry, &names(&["count"]), &mut tree, &AffectedPaths::none(), &SectionStatus::new());
        assert_eq!(outcome.status.widget("count").unwrap().value, Some(json!(4)));
    }

    #[test]
    fn test_selects() {
        assert!(selects(Some(&json!("other")), &json!("other")));
        assert!(selects(Some(&json!(["car", "other"])), &json!("other")));
        assert!(!selects(None, &json!("other")));
    }
}
