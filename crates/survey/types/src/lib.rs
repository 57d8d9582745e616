//! Survey Domain Types
//!
//! An interview is a single, mutable **response tree**. A questionnaire is
//! a registry of declarative **widget definitions** that read from and
//! write to that tree. Every edit recomputes a **widget status** for each
//! active widget: visible or hidden, valid or not, empty or responded.
//!
//! # Key Concepts
//!
//! - **ResponseTree**: the authoritative interview state, addressed by
//!   dot-separated paths.
//! - **WidgetDefinition**: a closed set of widget kinds (question, group,
//!   text, button), each carrying only the configuration relevant to it.
//! - **Conditional / Choices / Validations / DefaultValue**: injected,
//!   synchronous strategies evaluated against the tree.
//! - **WidgetStatus**: the display state of one widget instance after a
//!   pass. Group members are additionally keyed by their grouped object.
//! - **AffectedPaths**: what the triggering edit is about.
//! - **ValueDiff**: the writes a pass performed, for the caller to persist.
//!
//! # Design Principles
//!
//! 1. Definitions are immutable; the tree is the only mutable state.
//! 2. Strategy functions are pure and synchronous. Their failures never
//!    abort a pass.
//! 3. A widget's error state changes only when the respondent touched it.

#![deny(unsafe_code)]

mod affected;
mod datatype;
mod errors;
mod message;
mod status;
mod tree;
mod user;
mod widget;

pub use affected::*;
pub use datatype::*;
pub use errors::*;
pub use message::*;
pub use status::*;
pub use tree::*;
pub use user::*;
pub use widget::*;
