//! Error types for the survey layer

/// Errors that abort a reconcile pass.
///
/// Evaluator faults (a failing conditional, validation or default function)
/// are never represented here: they are logged and recovered where they
/// happen. Everything below is either a path that cannot be resolved
/// against the current tree or a defect in the questionnaire configuration.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Cannot resolve path '{template}' for widget '{widget}': {source}")]
    PathResolution {
        widget: String,
        template: String,
        #[source]
        source: PathTemplateError,
    },

    #[error("Group collection at '{path}' for widget '{widget}' is not an object")]
    InvalidGroupCollection { widget: String, path: String },

    #[error("Unknown widget: {0}")]
    UnknownWidget(String),

    #[error("Unknown section: {0}")]
    UnknownSection(String),

    #[error("Duplicate widget: {0}")]
    DuplicateWidget(String),

    #[error("Malformed group '{group}': {reason}")]
    MalformedGroup { group: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ReconcileError {
    /// Whether this error stems from the questionnaire configuration rather
    /// than from the current interview data.
    pub fn is_configuration_fault(&self) -> bool {
        matches!(
            self,
            Self::UnknownWidget(_)
                | Self::UnknownSection(_)
                | Self::DuplicateWidget(_)
                | Self::MalformedGroup { .. }
                | Self::InvalidConfig(_)
        )
    }

    /// Whether this error stems from a path that could not be resolved
    /// against the response tree.
    pub fn is_path_fault(&self) -> bool {
        matches!(
            self,
            Self::PathResolution { .. } | Self::InvalidGroupCollection { .. }
        )
    }
}

/// Errors raised while interpolating a path template
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathTemplateError {
    #[error("unclosed '{{' at byte {0}")]
    Unclosed(usize),

    #[error("empty token at byte {0}")]
    EmptyToken(usize),

    #[error("token '{0}' does not resolve to a scalar response")]
    Unresolved(String),
}

/// Result type alias for reconcile operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;
