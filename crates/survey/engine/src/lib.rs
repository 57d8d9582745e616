//! Survey Widget Reconciliation Engine
//!
//! Every respondent edit runs a synchronous pass over the active section of
//! a questionnaire. The pass recomputes each widget's status, injects
//! defaults, resets responses of hidden widgets and prunes selected choices
//! that are no longer offered.
//!
//! # Key Principle
//!
//! **The response tree is the only state.** Widget definitions are
//! immutable and their strategy functions only read the tree. Every write
//! the engine performs is reported in a value diff for the caller to
//! persist.
//!
//! # Architecture
//!
//! The [`InterviewSession`] drives a [`Reconciler`], which composes:
//!
//! - [`WidgetRegistry`]: widget definitions and section field lists
//! - [`ConditionalEvaluator`]: visibility and hidden-fallback values
//! - [`ChoiceVisibilityEvaluator`]: repairs selections of hidden choices
//! - [`ValidationEvaluator`]: validity and error message
//! - [`GroupExpander`]: ordered instances of repeatable groups
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use survey_engine::*;
//! use survey_types::*;
//!
//! let mut registry = WidgetRegistry::new();
//! registry.register("hasCar", QuestionWidget::new("hasCar")).unwrap();
//! registry
//!     .register(
//!         "carCount",
//!         QuestionWidget::new("carCount").with_conditional(Conditional::computed(|scope| {
//!             Ok(json!(scope.tree.response("hasCar") == Some(&json!("yes"))))
//!         })),
//!     )
//!     .unwrap();
//! registry.register_section("vehicles", ["hasCar", "carCount"]);
//!
//! let tree = ResponseTree::from_value(json!({ "carCount": 2 }));
//! let mut session = InterviewSession::new(Arc::new(registry), ReconcilerConfig::default(), tree).unwrap();
//!
//! // carCount is hidden, so its stale response is removed
//! let update = session.update_section("vehicles", SectionEdit::set("hasCar", json!("no"))).unwrap();
//! assert_eq!(update.value_diff.get("carCount"), Some(None));
//! assert!(session.tree().get("carCount").is_none());
//! ```

#![deny(unsafe_code)]

pub mod choices;
pub mod conditional;
pub mod config;
pub mod groups;
pub mod reconciler;
pub mod registry;
pub mod session;
pub mod validation;

// Re-export main types
pub use choices::{ChoiceCheck, ChoiceVisibilityEvaluator};
pub use conditional::{ConditionalEvaluator, Visibility};
pub use config::ReconcilerConfig;
pub use groups::{GroupExpander, GroupedObject};
pub use reconciler::{PassInput, PassOutcome, Reconciler};
pub use registry::WidgetRegistry;
pub use session::{InterviewSession, SectionEdit, SectionUpdate};
pub use validation::{ValidationEvaluator, ValidationOutcome};
