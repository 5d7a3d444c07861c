//! Error taxonomy for the stateline engine.

use thiserror::Error;

use crate::function::FunctionKind;
use crate::version::VersionKey;

/// Failure raised by a caller-supplied function or persistence hook.
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by model construction, registration, invocation, and
/// recovery.
///
/// Analysis failures are deliberately absent: they are non-fatal by
/// contract and travel over the model's event channel instead of this
/// taxonomy.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A function name was registered a second time, under any kind.
    #[error("function name already registered: {0}")]
    DuplicateName(String),

    /// No function of the expected kind is registered under this name.
    #[error("{kind} not registered: {name}")]
    UnknownName { kind: FunctionKind, name: String },

    /// No version with this key exists in the history.
    #[error("no version recorded for {0}")]
    UnknownVersion(VersionKey),

    /// A data modifier failed; the working data was left unchanged.
    #[error("data modifier {name} failed; working data left unchanged")]
    ModifierFailed {
        name: String,
        #[source]
        source: SourceError,
    },

    /// A business-logic step failed. Commits it applied before failing
    /// remain in effect.
    #[error("business logic {name} failed; commits applied before the failure remain in effect")]
    BusinessLogicFailed {
        name: String,
        #[source]
        source: SourceError,
    },

    /// A rollback reached past the recorded history.
    #[error("cannot roll back {requested} steps from step {current}")]
    OutOfRange { requested: u64, current: u64 },

    /// Invalid construction-time configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The injected checkpoint save hook failed; the step counter and
    /// history were left unchanged.
    #[error("checkpoint save hook failed for {key}")]
    SaveHookFailed {
        key: VersionKey,
        #[source]
        source: SourceError,
    },

    /// The injected checkpoint restore hook failed; the working data was
    /// left unchanged.
    #[error("checkpoint restore hook failed for {key}")]
    RestoreHookFailed {
        key: VersionKey,
        #[source]
        source: SourceError,
    },
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
