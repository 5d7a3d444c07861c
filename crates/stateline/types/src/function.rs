//! Function kinds and the declarative attributes attached at registration.

use serde::{Deserialize, Serialize};

/// Opaque token returned by a checkpoint save hook and stored in a
/// version in place of an in-memory snapshot.
pub type SaveToken = String;

/// The three kinds of registrable functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionKind {
    /// Pure state transition, invoked through `commit`.
    DataModifier,
    /// Orchestration step, invoked through `dispatch`.
    BusinessLogic,
    /// Read-only observer, triggered by checkpoints.
    Analysis,
}

impl std::fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::DataModifier => "data modifier",
            Self::BusinessLogic => "business logic",
            Self::Analysis => "analysis",
        };
        f.write_str(label)
    }
}

/// Attributes of a data modifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierAttrs {
    /// Record a version and trigger analyses after each successful
    /// commit of this modifier.
    pub checkpointed: bool,
}

/// Attributes of a business-logic step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogicAttrs {
    /// Record a version and trigger analyses after the step completes.
    pub checkpointed: bool,

    /// Re-dispatching this step within a session is a recorded no-op
    /// instead of a second run.
    pub unique: bool,
}

/// Attributes of an analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisAttrs {
    /// Run on the worker pool instead of the caller's thread.
    pub parallelizable: bool,
}

/// Outcome of dispatching a business-logic step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The step ran to completion.
    Completed,
    /// Uniqueness applied and the step had already been dispatched this
    /// session; nothing ran.
    Skipped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(FunctionKind::DataModifier.to_string(), "data modifier");
        assert_eq!(FunctionKind::BusinessLogic.to_string(), "business logic");
        assert_eq!(FunctionKind::Analysis.to_string(), "analysis");
    }

    #[test]
    fn test_attrs_default_to_plain() {
        assert!(!ModifierAttrs::default().checkpointed);
        let logic = LogicAttrs::default();
        assert!(!logic.checkpointed);
        assert!(!logic.unique);
        assert!(!AnalysisAttrs::default().parallelizable);
    }
}
