//! Conditional evaluator: resolves visibility and hidden-fallback values
//!
//! Every conditional shape normalizes to a [`Visibility`]. A computed
//! conditional that fails hides its widget: an unknown state must not
//! leave a stale question on screen.

use serde_json::Value;
use survey_types::{Conditional, EvalScope};

/// Resolved visibility of a widget
#[derive(Clone, Debug, PartialEq)]
pub struct Visibility {
    pub visible: bool,
    /// Value to assign to the response when hidden
    pub fallback: Option<Value>,
    /// Value to assign to the custom response when hidden
    pub custom_fallback: Option<Value>,
}

impl Visibility {
    pub fn visible() -> Self {
        Self {
            visible: true,
            fallback: None,
            custom_fallback: None,
        }
    }

    pub fn hidden() -> Self {
        Self {
            visible: false,
            fallback: None,
            custom_fallback: None,
        }
    }

    fn from_parts(visible: bool, fallback: Option<Value>, custom_fallback: Option<Value>) -> Self {
        // A fallback without a custom fallback clears the custom response
        let custom_fallback = match (&fallback, custom_fallback) {
            (_, Some(custom)) => Some(custom),
            (Some(_), None) => Some(Value::Null),
            (None, None) => None,
        };
        Self {
            visible,
            fallback,
            custom_fallback,
        }
    }
}

/// Evaluates widget and choice conditionals
#[derive(Clone, Debug, Default)]
pub struct ConditionalEvaluator;

impl ConditionalEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate a widget conditional. No conditional means always visible.
    pub fn evaluate(&self, conditional: Option<&Conditional>, scope: &EvalScope<'_>) -> Visibility {
        match conditional {
            None => Visibility::visible(),
            Some(Conditional::Literal(visible)) => Visibility::from_parts(*visible, None, None),
            Some(Conditional::Fixed {
                visible,
                fallback,
                custom_fallback,
            }) => Visibility::from_parts(*visible, fallback.clone(), custom_fallback.clone()),
            Some(Conditional::Computed(f)) => match f(scope) {
                Ok(result) => normalize(result, scope.path),
                Err(e) => {
                    tracing::warn!(path = %scope.path, error = %e, "Conditional failed, hiding widget");
                    Visibility::hidden()
                }
            },
        }
    }

    /// Evaluate a choice conditional: visibility plus the value replacing
    /// the choice when it is selected but hidden.
    pub fn evaluate_choice(
        &self,
        conditional: Option<&Conditional>,
        scope: &EvalScope<'_>,
    ) -> (bool, Option<Value>) {
        let visibility = self.evaluate(conditional, scope);
        (visibility.visible, visibility.fallback)
    }
}

/// Normalize a computed result: `bool`, `[bool]`, `[bool, v]` or
/// `[bool, v, cv]`. Anything else is cast to its truthiness.
fn normalize(result: Value, path: &str) -> Visibility {
    match result {
        Value::Bool(visible) => Visibility::from_parts(visible, None, None),
        Value::Array(items) => {
            let mut items = items.into_iter();
            let visible = match items.next() {
                Some(Value::Bool(visible)) => visible,
                Some(other) => {
                    tracing::debug!(path = %path, result = %other, "Conditional returned a non boolean visibility");
                    truthy(&other)
                }
                None => {
                    tracing::debug!(path = %path, "Conditional returned an empty array");
                    false
                }
            };
            Visibility::from_parts(visible, items.next(), items.next())
        }
        other => {
            tracing::debug!(path = %path, result = %other, "Conditional returned a non boolean condition");
            Visibility::from_parts(truthy(&other), None, None)
        }
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
