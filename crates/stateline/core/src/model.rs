//! The model: the single funnel through which registered functions run.
//!
//! A [`Model`] owns the registry, the session state, and the checkpoint
//! coordinator. Working data changes only inside `commit` and `dispatch`:
//! the funnel clones the current value, runs the registered function on
//! the clone, and replaces the authoritative value with the function's
//! return value. Business-logic steps receive a [`CommitScope`], the
//! only capability through which they can reach `commit`.
//!
//! All mutating entry points take `&mut self`, so the single-writer
//! assumption is enforced at compile time; callers that need the model
//! on several threads wrap it in their own lock.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use stateline_types::{
    AnalysisAttrs, DispatchOutcome, LogicAttrs, ModelError, ModifierAttrs, Result, SaveToken,
    VersionKey,
};
use tokio::sync::broadcast;
use tracing::{debug, instrument};

use crate::analysis::AnalysisDispatcher;
use crate::checkpoint::{CheckpointCoordinator, SnapshotHooks};
use crate::events::{self, ModelEvent};
use crate::history::HistoryView;
use crate::registry::FunctionRegistry;
use crate::session::SessionState;

/// Name recorded for the construction-time baseline; the baseline sits
/// at step 0 and is never part of the visible history.
const BASELINE_NAME: &str = "initial";

/// Tunables for a model. `Default` matches the interactive-session
/// profile: every worker the host offers, no forced uniqueness.
#[derive(Debug, Clone, Default)]
pub struct ModelConfig {
    /// Worker threads for the analysis pool. `None` uses the runtime's
    /// default (available concurrency).
    pub analysis_worker_threads: Option<usize>,

    /// Treat every business-logic step as unique-invocation, regardless
    /// of its registration attributes.
    pub unique_business_logic: bool,
}

/// A controlled state-mutation and versioning engine for one session.
///
/// `S` is the working data: an opaque, cloneable composite value. The
/// model owns the one authoritative `S`; everything handed out is a
/// clone.
pub struct Model<S> {
    registry: FunctionRegistry<S>,
    session: SessionState<S>,
    coordinator: CheckpointCoordinator<S>,
    dispatched: HashSet<String>,
    unique_business_logic: bool,
    events: broadcast::Sender<ModelEvent>,
}

impl<S> Model<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Create a model with default configuration and in-memory
    /// snapshots.
    pub fn new(initial: S) -> Result<Self> {
        Self::builder(initial).build()
    }

    /// Start configuring a model around its initial working data.
    pub fn builder(initial: S) -> ModelBuilder<S> {
        ModelBuilder::new(initial)
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Register a data modifier under `name`.
    ///
    /// The function receives a clone of the working data plus the call
    /// parameters and returns the next value. It becomes reachable only
    /// through [`Model::commit`]; the callable itself is never handed
    /// back out.
    pub fn register_data_modifier<F>(
        &mut self,
        name: impl Into<String>,
        attrs: ModifierAttrs,
        func: F,
    ) -> Result<()>
    where
        F: Fn(S, &Value) -> anyhow::Result<S> + Send + Sync + 'static,
    {
        self.registry.register_modifier(name.into(), attrs, Arc::new(func))
    }

    /// Register a business-logic step under `name`.
    ///
    /// The function receives a clone of the working data, the commit
    /// capability, and the call parameters. Mutating the clone has no
    /// observable effect; state changes happen only through the
    /// capability's `commit`.
    pub fn register_business_logic<F>(
        &mut self,
        name: impl Into<String>,
        attrs: LogicAttrs,
        func: F,
    ) -> Result<()>
    where
        F: for<'a> Fn(S, &mut CommitScope<'a, S>, &Value) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.registry.register_logic(name.into(), attrs, Arc::new(func))
    }

    /// Register an analysis under `name`, run against every new
    /// checkpoint with a clone of the data and a read-only history view.
    pub fn register_analysis<F>(
        &mut self,
        name: impl Into<String>,
        attrs: AnalysisAttrs,
        func: F,
    ) -> Result<()>
    where
        F: Fn(S, HistoryView<S>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.registry.register_analysis(name.into(), attrs, Arc::new(func))
    }

    // ── Invocation Funnel ────────────────────────────────────────────

    /// Run the data modifier registered under `name` and replace the
    /// working data with its return value.
    ///
    /// The modifier operates on a clone; if it fails, the working data
    /// is left exactly as it was. A checkpointed modifier records a
    /// version and triggers analyses after the replacement.
    #[instrument(skip(self, params))]
    pub fn commit(&mut self, name: &str, params: Value) -> Result<()> {
        let (func, attrs) = self.registry.resolve_modifier(name)?;

        let copy = self.session.data().clone();
        let next = func(copy, &params).map_err(|source| ModelError::ModifierFailed {
            name: name.to_string(),
            source: source.into(),
        })?;

        self.session.replace(next);
        debug!(name = %name, "working data replaced");

        if attrs.checkpointed {
            self.checkpoint(name)?;
        }
        Ok(())
    }

    /// Run the business-logic step registered under `name`.
    ///
    /// A step whose uniqueness applies (its own registration flag, or
    /// the model-wide setting) is skipped when it was already dispatched
    /// this session: the skip is recorded on the event channel and
    /// reported as [`DispatchOutcome::Skipped`], not as an error.
    ///
    /// The step's `commit` calls run against the then-current working
    /// data, and commits applied before a failure stay applied.
    #[instrument(skip(self, params))]
    pub fn dispatch(&mut self, name: &str, params: Value) -> Result<DispatchOutcome> {
        let (func, attrs) = self.registry.resolve_logic(name)?;

        let unique = self.unique_business_logic || attrs.unique;
        if unique && self.dispatched.contains(name) {
            debug!(name = %name, "unique step already dispatched; skipping");
            let _ = self.events.send(ModelEvent::DispatchSkipped {
                name: name.to_string(),
            });
            return Ok(DispatchOutcome::Skipped);
        }
        // Recorded before execution: a step that failed partway may have
        // applied commits, so a re-run is not assumed safe.
        self.dispatched.insert(name.to_string());

        let copy = self.session.data().clone();
        let mut scope = CommitScope { model: self };
        func(copy, &mut scope, &params).map_err(|source| ModelError::BusinessLogicFailed {
            name: name.to_string(),
            source: source.into(),
        })?;

        if attrs.checkpointed {
            self.checkpoint(name)?;
        }
        Ok(DispatchOutcome::Completed)
    }

    fn checkpoint(&mut self, name: &str) -> Result<()> {
        self.coordinator
            .checkpoint(&mut self.session, self.registry.analyses(), name)?;
        Ok(())
    }

    // ── Recovery ─────────────────────────────────────────────────────

    /// Restore the working data recorded `n_steps` checkpoints ago and
    /// return the key it was restored to.
    ///
    /// `rollback(0)` re-materializes the current step. Rolling back all
    /// the way lands on the construction-time baseline. History is not
    /// truncated and the step counter is not rewound; the next
    /// checkpoint continues the sequence.
    pub fn rollback(&mut self, n_steps: u64) -> Result<VersionKey> {
        let current = self.session.step();
        let target = current
            .checked_sub(n_steps)
            .ok_or(ModelError::OutOfRange {
                requested: n_steps,
                current,
            })?;

        let key = if target == 0 {
            VersionKey::new(0, BASELINE_NAME)
        } else {
            // Steps are gap-free, so the version at `target` exists.
            self.coordinator
                .version_at_step(target)
                .map(|version| version.key().clone())
                .ok_or(ModelError::OutOfRange {
                    requested: n_steps,
                    current,
                })?
        };

        let data = if key.step == 0 {
            self.coordinator.baseline()
        } else {
            self.coordinator.restore(&key)?
        };
        self.session.replace(data);
        debug!(key = %key, "working data rolled back");
        let _ = self.events.send(ModelEvent::RolledBack { key: key.clone() });
        Ok(key)
    }

    /// Restore the working data recorded for exactly `key`.
    ///
    /// Like [`Model::rollback`], this moves only the working data;
    /// recorded versions and the step counter are untouched.
    pub fn revert_to_version(&mut self, key: &VersionKey) -> Result<()> {
        let data = self.coordinator.restore(key)?;
        self.session.replace(data);
        debug!(key = %key, "working data reverted");
        let _ = self.events.send(ModelEvent::RolledBack { key: key.clone() });
        Ok(())
    }

    // ── Inspection ───────────────────────────────────────────────────

    /// A clone of the current working data.
    pub fn current_data(&self) -> S {
        self.session.data().clone()
    }

    /// Step of the most recent checkpoint; 0 before any.
    pub fn current_step(&self) -> u64 {
        self.session.step()
    }

    /// A read-only, point-in-time view of the recorded versions.
    pub fn history(&self) -> HistoryView<S> {
        self.coordinator.view()
    }

    /// Whether a business-logic step was dispatched this session.
    pub fn has_dispatched(&self, name: &str) -> bool {
        self.dispatched.contains(name)
    }

    /// Subscribe to the model's event channel.
    pub fn subscribe(&self) -> broadcast::Receiver<ModelEvent> {
        self.events.subscribe()
    }

    /// Block until every submitted parallel analysis has finished.
    ///
    /// The default contract is fire-and-forget; this join point exists
    /// for callers that want deterministic completion, such as tests.
    pub fn wait_for_analyses(&self) {
        self.coordinator.dispatcher().wait_all();
    }
}

/// The commit capability handed to business-logic steps.
///
/// A scope exposes exactly the surface a step may use: `commit` plus
/// read-only inspection. It borrows the model for the duration of the
/// step, so a step cannot stash it or re-enter `dispatch`.
pub struct CommitScope<'a, S> {
    model: &'a mut Model<S>,
}

impl<S> CommitScope<'_, S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Run a data modifier against the then-current working data, with
    /// full `commit` semantics including checkpointing.
    pub fn commit(&mut self, name: &str, params: Value) -> Result<()> {
        self.model.commit(name, params)
    }

    /// A clone of the working data as of now, which is newer than the
    /// copy the step itself received if commits have been applied since.
    pub fn current_data(&self) -> S {
        self.model.current_data()
    }

    /// A read-only view of the recorded versions.
    pub fn history(&self) -> HistoryView<S> {
        self.model.history()
    }
}

/// Configures and validates a [`Model`].
///
/// Persistence hooks are paired: supplying only one of
/// `on_checkpoint_save` / `on_checkpoint_restore` is a configuration
/// error at build time.
pub struct ModelBuilder<S> {
    initial: S,
    save: Option<crate::checkpoint::SaveFn<S>>,
    restore: Option<crate::checkpoint::RestoreFn<S>>,
    config: ModelConfig,
}

impl<S> ModelBuilder<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn new(initial: S) -> Self {
        Self {
            initial,
            save: None,
            restore: None,
            config: ModelConfig::default(),
        }
    }

    /// Persist snapshots through `hook` instead of keeping full copies
    /// in memory. Requires a matching restore hook.
    pub fn on_checkpoint_save<F>(mut self, hook: F) -> Self
    where
        F: Fn(&S, &VersionKey, &HistoryView<S>) -> anyhow::Result<SaveToken>
            + Send
            + Sync
            + 'static,
    {
        self.save = Some(Arc::new(hook));
        self
    }

    /// Load snapshots through `hook` at rollback time. Requires a
    /// matching save hook.
    pub fn on_checkpoint_restore<F>(mut self, hook: F) -> Self
    where
        F: Fn(&VersionKey, &HistoryView<S>) -> anyhow::Result<S> + Send + Sync + 'static,
    {
        self.restore = Some(Arc::new(hook));
        self
    }

    /// Treat every business-logic step as unique-invocation.
    pub fn unique_business_logic(mut self, unique: bool) -> Self {
        self.config.unique_business_logic = unique;
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the configuration and construct the model.
    pub fn build(self) -> Result<Model<S>> {
        let hooks = match (self.save, self.restore) {
            (Some(save), Some(restore)) => Some(SnapshotHooks { save, restore }),
            (None, None) => None,
            _ => {
                return Err(ModelError::Configuration(
                    "checkpoint hooks must be supplied together: \
                     both save and restore, or neither"
                        .to_string(),
                ))
            }
        };

        let events = events::channel();
        let dispatcher =
            AnalysisDispatcher::new(self.config.analysis_worker_threads, events.clone())?;
        let baseline = Arc::new(self.initial.clone());

        Ok(Model {
            registry: FunctionRegistry::new(),
            session: SessionState::new(self.initial),
            coordinator: CheckpointCoordinator::new(baseline, hooks, dispatcher, events.clone()),
            dispatched: HashSet::new(),
            unique_business_logic: self.config.unique_business_logic,
            events,
        })
    }
}
