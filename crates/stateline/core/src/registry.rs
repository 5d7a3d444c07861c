//! Registration and name-based resolution of model functions.
//!
//! Callables are stored behind `Arc<dyn Fn>` and resolved only inside
//! this crate. Nothing here hands a raw callable back to user code:
//! registered functions are reachable exclusively through the model's
//! `commit` and `dispatch` entry points, so direct invocation is
//! structurally impossible rather than checked at runtime.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use stateline_types::{
    AnalysisAttrs, FunctionKind, LogicAttrs, ModelError, ModifierAttrs, Result,
};

use crate::history::HistoryView;
use crate::model::CommitScope;

/// A pure state transition: consumes a copy of the working data and
/// returns the next value.
pub type DataModifierFn<S> = Arc<dyn Fn(S, &Value) -> anyhow::Result<S> + Send + Sync>;

/// An orchestration step: receives a copy of the working data and the
/// commit capability bound to the owning model.
pub type BusinessLogicFn<S> = Arc<
    dyn for<'a> Fn(S, &mut CommitScope<'a, S>, &Value) -> anyhow::Result<()> + Send + Sync,
>;

/// A read-only observer of checkpointed states.
pub type AnalysisFn<S> = Arc<dyn Fn(S, HistoryView<S>) -> anyhow::Result<()> + Send + Sync>;

struct ModifierEntry<S> {
    func: DataModifierFn<S>,
    attrs: ModifierAttrs,
}

struct LogicEntry<S> {
    func: BusinessLogicFn<S>,
    attrs: LogicAttrs,
}

pub(crate) struct AnalysisEntry<S> {
    pub(crate) name: String,
    pub(crate) func: AnalysisFn<S>,
    pub(crate) attrs: AnalysisAttrs,
}

/// Registry of all functions attached to a model. Names are unique
/// across kinds; entries are immutable once registered.
pub(crate) struct FunctionRegistry<S> {
    modifiers: HashMap<String, ModifierEntry<S>>,
    logic: HashMap<String, LogicEntry<S>>,
    // Analyses keep registration order; sequential dispatch preserves it.
    analyses: Vec<AnalysisEntry<S>>,
    names: HashSet<String>,
}

impl<S> FunctionRegistry<S> {
    pub(crate) fn new() -> Self {
        Self {
            modifiers: HashMap::new(),
            logic: HashMap::new(),
            analyses: Vec::new(),
            names: HashSet::new(),
        }
    }

    fn claim_name(&mut self, name: &str) -> Result<()> {
        if !self.names.insert(name.to_string()) {
            return Err(ModelError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    pub(crate) fn register_modifier(
        &mut self,
        name: String,
        attrs: ModifierAttrs,
        func: DataModifierFn<S>,
    ) -> Result<()> {
        self.claim_name(&name)?;
        tracing::debug!(
            name = %name,
            checkpointed = attrs.checkpointed,
            "data modifier registered"
        );
        self.modifiers.insert(name, ModifierEntry { func, attrs });
        Ok(())
    }

    pub(crate) fn register_logic(
        &mut self,
        name: String,
        attrs: LogicAttrs,
        func: BusinessLogicFn<S>,
    ) -> Result<()> {
        self.claim_name(&name)?;
        tracing::debug!(
            name = %name,
            checkpointed = attrs.checkpointed,
            unique = attrs.unique,
            "business logic registered"
        );
        self.logic.insert(name, LogicEntry { func, attrs });
        Ok(())
    }

    pub(crate) fn register_analysis(
        &mut self,
        name: String,
        attrs: AnalysisAttrs,
        func: AnalysisFn<S>,
    ) -> Result<()> {
        self.claim_name(&name)?;
        tracing::debug!(
            name = %name,
            parallelizable = attrs.parallelizable,
            "analysis registered"
        );
        self.analyses.push(AnalysisEntry { name, func, attrs });
        Ok(())
    }

    pub(crate) fn resolve_modifier(
        &self,
        name: &str,
    ) -> Result<(DataModifierFn<S>, ModifierAttrs)> {
        self.modifiers
            .get(name)
            .map(|entry| (Arc::clone(&entry.func), entry.attrs))
            .ok_or_else(|| ModelError::UnknownName {
                kind: FunctionKind::DataModifier,
                name: name.to_string(),
            })
    }

    pub(crate) fn resolve_logic(&self, name: &str) -> Result<(BusinessLogicFn<S>, LogicAttrs)> {
        self.logic
            .get(name)
            .map(|entry| (Arc::clone(&entry.func), entry.attrs))
            .ok_or_else(|| ModelError::UnknownName {
                kind: FunctionKind::BusinessLogic,
                name: name.to_string(),
            })
    }

    /// All analyses, in registration order.
    pub(crate) fn analyses(&self) -> &[AnalysisEntry<S>] {
        &self.analyses
    }
}
