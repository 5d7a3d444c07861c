//! # Stateline Core - Guarded State Mutation and Versioning
//!
//! This crate provides the state-transition and versioning engine for
//! long-running, interactively-driven analysis sessions.
//!
//! ## Overview
//!
//! A [`Model`] owns one authoritative working-data value and enforces
//! that it changes only through registered, named functions invoked via
//! a single funnel:
//!
//! - **Data modifiers** run through [`Model::commit`]: a pure state
//!   transition from a copy of the current value to the next value
//! - **Business-logic steps** run through [`Model::dispatch`] and issue
//!   nested commits through the [`CommitScope`] capability
//! - **Analyses** are read-only observers triggered automatically by
//!   every checkpoint, sequentially or on a worker pool
//!
//! Checkpointed invocations append immutable versions to an append-only
//! history; [`Model::rollback`] and [`Model::revert_to_version`] restore
//! earlier states without truncating that history.
//!
//! ## Architectural Boundaries
//!
//! The engine never interprets the working data: it is an opaque,
//! cloneable value, and every function receives an independent clone,
//! never a live reference. Persistence is delegated to an optional pair
//! of save/restore hooks injected at construction; without them, full
//! in-memory copies are kept.
//!
//! Registered callables are stored internally and never handed back to
//! user code, so invoking one by any path other than `commit`/`dispatch`
//! is structurally impossible.
//!
//! ## Key Components
//!
//! - [`Model`]: the facade for registration, the invocation funnel,
//!   inspection, and recovery
//! - [`ModelBuilder`] / [`ModelConfig`]: validated construction
//! - [`HistoryView`] / [`Version`]: read-only views of recorded states
//! - [`ModelEvent`]: checkpoint, rollback, skip, and analysis-failure
//!   notifications on a broadcast channel
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use stateline_core::{Model, ModifierAttrs};
//!
//! # fn main() -> stateline_core::Result<()> {
//! let mut model = Model::new(json!({ "n": 5 }))?;
//!
//! model.register_data_modifier(
//!     "scale",
//!     ModifierAttrs { checkpointed: true },
//!     |mut data, params| {
//!         let factor = params.get("factor").and_then(|v| v.as_i64()).unwrap_or(1);
//!         let n = data["n"].as_i64().unwrap_or(0);
//!         data["n"] = (n * factor).into();
//!         Ok(data)
//!     },
//! )?;
//!
//! model.commit("scale", json!({ "factor": 2 }))?;
//! assert_eq!(model.current_data()["n"], 10);
//! assert_eq!(model.history().len(), 1);
//!
//! model.rollback(1)?;
//! assert_eq!(model.current_data()["n"], 5);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod events;
pub mod history;
pub mod model;

mod analysis;
mod checkpoint;
mod registry;
mod session;

// Re-export main types
pub use events::ModelEvent;
pub use history::{HistoryView, Version};
pub use model::{CommitScope, Model, ModelBuilder, ModelConfig};

// Shared types, re-exported so most callers need only this crate
pub use stateline_types::{
    AnalysisAttrs, DispatchOutcome, FunctionKind, LogicAttrs, ModelError, ModifierAttrs, Result,
    SaveToken, VersionKey,
};
