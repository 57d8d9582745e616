//! Validation evaluator: validity and error message of one response

use survey_types::{LocalizedText, ValidationScope, Validations};

/// Result of validating a response
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub error_message: Option<LocalizedText>,
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            error_message: None,
        }
    }
}

/// Runs a question's validation function.
///
/// A failing validation function counts as valid: broken validation logic
/// must never block a respondent.
#[derive(Clone, Debug, Default)]
pub struct ValidationEvaluator;

impl ValidationEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, validations: Option<&Validations>, scope: &ValidationScope<'_>) -> ValidationOutcome {
        let Some(Validations(f)) = validations else {
            return ValidationOutcome::valid();
        };
        match f(scope) {
            Ok(rules) => rules
                .into_iter()
                .find(|rule| rule.validation)
                .map(|rule| ValidationOutcome {
                    is_valid: false,
                    error_message: Some(rule.error_message),
                })
                .unwrap_or_else(ValidationOutcome::valid),
            Err(e) => {
                tracing::warn!(path = %scope.path, error = %e, "Validation failed, treating as valid");
                ValidationOutcome::valid()
            }
        }
    }
}
