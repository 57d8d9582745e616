//! Widget definitions: the declarative questionnaire configuration
//!
//! A widget is one of a closed set of kinds. Questions carry a response
//! path plus the strategies that decide their visibility, choices,
//! validity and default value. Groups repeat a list of member widgets once
//! per object of a collection in the tree. Text and buttons have no
//! response path.
//!
//! Strategies are injected as synchronous closures returning
//! [`anyhow::Result`]. An `Err` is an evaluator fault: the engine logs it
//! and fails open for that one widget.

use crate::{Datatype, InputType, InterviewUser, LocalizedText, ResponseTree};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

// ── Evaluation scopes ────────────────────────────────────────────────

/// What a conditional, choice list or default value function can see
#[derive(Clone, Copy, Debug)]
pub struct EvalScope<'a> {
    pub tree: &'a ResponseTree,
    pub path: &'a str,
    pub custom_path: Option<&'a str>,
    pub user: Option<&'a InterviewUser>,
}

impl<'a> EvalScope<'a> {
    pub fn new(tree: &'a ResponseTree, path: &'a str) -> Self {
        Self {
            tree,
            path,
            custom_path: None,
            user: None,
        }
    }

    pub fn with_custom_path(mut self, custom_path: Option<&'a str>) -> Self {
        self.custom_path = custom_path;
        self
    }

    pub fn with_user(mut self, user: Option<&'a InterviewUser>) -> Self {
        self.user = user;
        self
    }

    /// The response at the widget's own path
    pub fn value(&self) -> Option<&'a Value> {
        self.tree.response(self.path)
    }
}

/// What a validation function can see
#[derive(Clone, Copy, Debug)]
pub struct ValidationScope<'a> {
    pub value: Option<&'a Value>,
    pub custom_value: Option<&'a Value>,
    pub tree: &'a ResponseTree,
    pub path: &'a str,
    pub custom_path: Option<&'a str>,
}

// ── Strategy function types ──────────────────────────────────────────

/// Returns a boolean, `[bool]`, `[bool, value]` or `[bool, value, custom]`
pub type ConditionalFn = dyn Fn(&EvalScope<'_>) -> anyhow::Result<Value> + Send + Sync;

pub type ChoicesFn = dyn Fn(&EvalScope<'_>) -> anyhow::Result<Vec<ChoiceEntry>> + Send + Sync;

pub type ValidationFn =
    dyn Fn(&ValidationScope<'_>) -> anyhow::Result<Vec<ValidationRule>> + Send + Sync;

/// `Ok(None)` means "no default"
pub type DefaultValueFn = dyn Fn(&EvalScope<'_>) -> anyhow::Result<Option<Value>> + Send + Sync;

/// Narrows a group's raw collection
pub type GroupFilterFn =
    dyn Fn(&ResponseTree, &Map<String, Value>) -> anyhow::Result<Map<String, Value>> + Send + Sync;

// ── Conditionals ─────────────────────────────────────────────────────

/// Visibility rule of a widget or of a single choice
#[derive(Clone)]
pub enum Conditional {
    /// Always visible or always hidden
    Literal(bool),
    /// Fixed visibility with the values to assign when hidden
    Fixed {
        visible: bool,
        fallback: Option<Value>,
        custom_fallback: Option<Value>,
    },
    /// Computed from the tree on every pass
    Computed(Arc<ConditionalFn>),
}

impl Conditional {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&EvalScope<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(f))
    }

    pub fn hidden_with(fallback: Value) -> Self {
        Self::Fixed {
            visible: false,
            fallback: Some(fallback),
            custom_fallback: None,
        }
    }
}

impl fmt::Debug for Conditional {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(visible) => f.debug_tuple("Literal").field(visible).finish(),
            Self::Fixed {
                visible,
                fallback,
                custom_fallback,
            } => f
                .debug_struct("Fixed")
                .field("visible", visible)
                .field("fallback", fallback)
                .field("custom_fallback", custom_fallback)
                .finish(),
            Self::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}

// ── Choices ──────────────────────────────────────────────────────────

/// One selectable value
#[derive(Clone, Debug)]
pub struct Choice {
    pub value: Value,
    pub label: Option<LocalizedText>,
    pub conditional: Option<Conditional>,
}

impl Choice {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            label: None,
            conditional: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<LocalizedText>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_conditional(mut self, conditional: Conditional) -> Self {
        self.conditional = Some(conditional);
        self
    }
}

/// A choice, or a labelled group of choices
#[derive(Clone, Debug)]
pub enum ChoiceEntry {
    Single(Choice),
    Grouped {
        label: Option<LocalizedText>,
        choices: Vec<Choice>,
    },
}

impl From<Choice> for ChoiceEntry {
    fn from(choice: Choice) -> Self {
        Self::Single(choice)
    }
}

/// Flatten grouped entries one level, keeping declaration order
pub fn flatten_choices(entries: &[ChoiceEntry]) -> Vec<&Choice> {
    entries
        .iter()
        .flat_map(|entry| match entry {
            ChoiceEntry::Single(choice) => std::slice::from_ref(choice).iter(),
            ChoiceEntry::Grouped { choices, .. } => choices.iter(),
        })
        .collect()
}

/// The choice list of a question
#[derive(Clone)]
pub enum Choices {
    Static(Vec<ChoiceEntry>),
    Computed(Arc<ChoicesFn>),
}

impl Choices {
    pub fn of<I, C>(choices: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ChoiceEntry>,
    {
        Self::Static(choices.into_iter().map(Into::into).collect())
    }

    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&EvalScope<'_>) -> anyhow::Result<Vec<ChoiceEntry>> + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(f))
    }
}

impl fmt::Debug for Choices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(entries) => f.debug_tuple("Static").field(entries).finish(),
            Self::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}

// ── Validations and defaults ─────────────────────────────────────────

/// One validation check. `validation == true` means the check FAILED.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationRule {
    pub validation: bool,
    pub error_message: LocalizedText,
}

impl ValidationRule {
    pub fn new(failed: bool, error_message: impl Into<LocalizedText>) -> Self {
        Self {
            validation: failed,
            error_message: error_message.into(),
        }
    }
}

/// The validation function of a question
#[derive(Clone)]
pub struct Validations(pub Arc<ValidationFn>);

impl Validations {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&ValidationScope<'_>) -> anyhow::Result<Vec<ValidationRule>> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for Validations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validations(<fn>)")
    }
}

/// A default value, fixed or computed
#[derive(Clone)]
pub enum DefaultValue {
    Literal(Value),
    Computed(Arc<DefaultValueFn>),
}

impl DefaultValue {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&EvalScope<'_>) -> anyhow::Result<Option<Value>> + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(f))
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}

// ── Widget kinds ─────────────────────────────────────────────────────

/// A question writing its response at `path`
#[derive(Clone, Debug, Default)]
pub struct QuestionWidget {
    /// Path relative to the enclosing group object, may contain `{tokens}`
    pub path: String,
    /// Secondary path for the free-text "other" response
    pub custom_path: Option<String>,
    pub input_type: InputType,
    pub conditional: Option<Conditional>,
    pub choices: Option<Choices>,
    pub validations: Option<Validations>,
    pub default_value: Option<DefaultValue>,
    pub custom_default_value: Option<DefaultValue>,
    pub datatype: Option<Datatype>,
    pub custom_datatype: Option<Datatype>,
    pub is_modal: bool,
    /// Re-apply the default even when the question already has a response
    pub update_default_value_when_responded: bool,
    /// Use the hidden-fallback value as the default when becoming visible
    pub use_assigned_value_on_hide: bool,
    /// The choice value that reveals the custom text box
    pub custom_choice: Option<Value>,
}

impl QuestionWidget {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_input_type(mut self, input_type: InputType) -> Self {
        self.input_type = input_type;
        self
    }

    pub fn with_custom_path(mut self, custom_path: impl Into<String>) -> Self {
        self.custom_path = Some(custom_path.into());
        self
    }

    pub fn with_conditional(mut self, conditional: Conditional) -> Self {
        self.conditional = Some(conditional);
        self
    }

    pub fn with_choices(mut self, choices: Choices) -> Self {
        self.choices = Some(choices);
        self
    }

    pub fn with_validations(mut self, validations: Validations) -> Self {
        self.validations = Some(validations);
        self
    }

    pub fn with_default_value(mut self, default_value: DefaultValue) -> Self {
        self.default_value = Some(default_value);
        self
    }

    pub fn with_custom_default_value(mut self, default_value: DefaultValue) -> Self {
        self.custom_default_value = Some(default_value);
        self
    }

    pub fn with_datatype(mut self, datatype: Datatype) -> Self {
        self.datatype = Some(datatype);
        self
    }

    pub fn with_custom_datatype(mut self, datatype: Datatype) -> Self {
        self.custom_datatype = Some(datatype);
        self
    }

    pub fn with_custom_choice(mut self, sentinel: impl Into<Value>) -> Self {
        self.custom_choice = Some(sentinel.into());
        self
    }

    pub fn modal(mut self) -> Self {
        self.is_modal = true;
        self
    }

    pub fn update_default_when_responded(mut self) -> Self {
        self.update_default_value_when_responded = true;
        self
    }

    pub fn use_assigned_value_on_hide(mut self) -> Self {
        self.use_assigned_value_on_hide = true;
        self
    }
}

/// A repeated block of widgets, one instance per object of a collection
#[derive(Clone, Default)]
pub struct GroupWidget {
    /// Path of the collection, may contain `{tokens}`
    pub path: String,
    /// Member widget names, in display order
    pub widgets: Vec<String>,
    pub filter: Option<Arc<GroupFilterFn>>,
}

impl GroupWidget {
    pub fn new<I, S>(path: impl Into<String>, widgets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into(),
            widgets: widgets.into_iter().map(Into::into).collect(),
            filter: None,
        }
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&ResponseTree, &Map<String, Value>) -> anyhow::Result<Map<String, Value>>
            + Send
            + Sync
            + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }
}

impl fmt::Debug for GroupWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupWidget")
            .field("path", &self.path)
            .field("widgets", &self.widgets)
            .field("filter", &self.filter.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Static text or a button: no response, only visibility
#[derive(Clone, Debug, Default)]
pub struct InfoWidget {
    pub conditional: Option<Conditional>,
}

impl InfoWidget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conditional(mut self, conditional: Conditional) -> Self {
        self.conditional = Some(conditional);
        self
    }
}

/// Every widget kind the engine knows about
#[derive(Clone, Debug)]
pub enum WidgetDefinition {
    Question(QuestionWidget),
    Group(GroupWidget),
    Text(InfoWidget),
    Button(InfoWidget),
}

impl WidgetDefinition {
    pub fn kind(&self) -> WidgetKind {
        match self {
            Self::Question(_) => WidgetKind::Question,
            Self::Group(_) => WidgetKind::Group,
            Self::Text(_) => WidgetKind::Text,
            Self::Button(_) => WidgetKind::Button,
        }
    }
}

impl From<QuestionWidget> for WidgetDefinition {
    fn from(widget: QuestionWidget) -> Self {
        Self::Question(widget)
    }
}

impl From<GroupWidget> for WidgetDefinition {
    fn from(widget: GroupWidget) -> Self {
        Self::Group(widget)
    }
}

/// Tag of a [`WidgetDefinition`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    Question,
    Group,
    Text,
    Button,
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Question => "question",
            Self::Group => "group",
            Self::Text => "text",
            Self::Button => "button",
        };
        f.write_str(name)
    }
}
