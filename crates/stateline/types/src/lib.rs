//! Shared types for the stateline state-transition and versioning engine.
//!
//! This crate carries the types every other stateline crate agrees on:
//!
//! - [`VersionKey`]: identity of a checkpointed state (step + name)
//! - [`FunctionKind`] and the registration attribute records
//! - [`DispatchOutcome`]: result of dispatching a business-logic step
//! - [`ModelError`]: the engine's error taxonomy
//!
//! The engine itself lives in `stateline-core`.

pub mod error;
pub mod function;
pub mod version;

pub use error::{ModelError, Result, SourceError};
pub use function::{
    AnalysisAttrs, DispatchOutcome, FunctionKind, LogicAttrs, ModifierAttrs, SaveToken,
};
pub use version::VersionKey;
