//! Choice visibility evaluator: repairs responses whose selected choices
//! became hidden

use crate::conditional::ConditionalEvaluator;
use serde_json::Value;
use std::borrow::Cow;
use survey_types::{flatten_choices, is_blank, ChoiceEntry, Choices, EvalScope};

/// Outcome of checking the selected choices of a response
#[derive(Clone, Debug, PartialEq)]
pub struct ChoiceCheck {
    /// Every selected choice is still visible
    pub all_visible: bool,
    /// The repaired response; equal to the current one when `all_visible`
    pub adjusted: Option<Value>,
}

/// Checks selected choices against their own conditionals
#[derive(Clone, Debug, Default)]
pub struct ChoiceVisibilityEvaluator {
    conditionals: ConditionalEvaluator,
}

impl ChoiceVisibilityEvaluator {
    pub fn new(conditionals: ConditionalEvaluator) -> Self {
        Self { conditionals }
    }

    pub fn evaluate(&self, current: Option<&Value>, choices: &Choices, scope: &EvalScope<'_>) -> ChoiceCheck {
        let unchanged = ChoiceCheck {
            all_visible: true,
            adjusted: current.cloned(),
        };
        if is_blank(current) {
            return unchanged;
        }
        let Some(current) = current else {
            return unchanged;
        };

        let entries: Cow<'_, [ChoiceEntry]> = match choices {
            Choices::Static(entries) => Cow::Borrowed(entries.as_slice()),
            Choices::Computed(f) => match f(scope) {
                Ok(entries) => Cow::Owned(entries),
                Err(e) => {
                    tracing::warn!(path = %scope.path, error = %e, "Choice list failed, keeping selection");
                    return unchanged;
                }
            },
        };
        let available = flatten_choices(&entries);

        let selected: Vec<&Value> = match current {
            Value::Array(items) => items.iter().collect(),
            scalar => vec![scalar],
        };
        let checked: Vec<(&Value, bool, Option<Value>)> = selected
            .into_iter()
            .map(|value| match available.iter().find(|choice| &choice.value == value) {
                Some(choice) => {
                    let (visible, substitute) = self
                        .conditionals
                        .evaluate_choice(choice.conditional.as_ref(), scope);
                    (value, visible, substitute)
                }
                None => (value, false, None),
            })
            .collect();

        if checked.iter().all(|(_, visible, _)| *visible) {
            return unchanged;
        }

        let mut repaired: Vec<Value> = Vec::with_capacity(checked.len());
        for (value, visible, substitute) in checked {
            let kept = if visible { Some(value.clone()) } else { substitute };
            if let Some(kept) = kept {
                if !is_blank(Some(&kept)) && !repaired.contains(&kept) {
                    repaired.push(kept);
                }
            }
        }

        tracing::debug!(path = %scope.path, "Selected choices no longer visible");
        let adjusted = match current {
            Value::Array(_) => Some(Value::Array(repaired)),
            _ => repaired.into_iter().next(),
        };
        ChoiceCheck {
            all_visible: false,
            adjusted,
        }
    }
}
