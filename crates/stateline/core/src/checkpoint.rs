//! Checkpoint coordination: snapshotting session state into history and
//! triggering analyses.
//!
//! The coordinator is the only writer of the history store. Snapshots
//! are in-memory copies by default; a paired save/restore hook set
//! delegates persistence to the caller, with an opaque token stored in
//! the version instead of the data.

use std::sync::Arc;

use stateline_types::{ModelError, Result, SaveToken, VersionKey};
use tokio::sync::broadcast;
use tracing::{debug, instrument};

use crate::analysis::AnalysisDispatcher;
use crate::events::ModelEvent;
use crate::history::{HistoryStore, HistoryView, Version};
use crate::registry::AnalysisEntry;
use crate::session::SessionState;

/// Strategy invoked at checkpoint time to persist a snapshot externally.
/// The returned token is stored in the version in place of the data.
pub type SaveFn<S> = Arc<
    dyn Fn(&S, &VersionKey, &HistoryView<S>) -> anyhow::Result<SaveToken> + Send + Sync,
>;

/// Strategy invoked at restore time to load the data a save hook
/// persisted for `key`.
pub type RestoreFn<S> =
    Arc<dyn Fn(&VersionKey, &HistoryView<S>) -> anyhow::Result<S> + Send + Sync>;

/// Paired persistence hooks. Built by the model builder, which rejects
/// partial configuration.
pub(crate) struct SnapshotHooks<S> {
    pub(crate) save: SaveFn<S>,
    pub(crate) restore: RestoreFn<S>,
}

pub(crate) struct CheckpointCoordinator<S> {
    history: HistoryStore<S>,
    hooks: Option<SnapshotHooks<S>>,
    dispatcher: AnalysisDispatcher,
    events: broadcast::Sender<ModelEvent>,
}

impl<S> CheckpointCoordinator<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        baseline: Arc<S>,
        hooks: Option<SnapshotHooks<S>>,
        dispatcher: AnalysisDispatcher,
        events: broadcast::Sender<ModelEvent>,
    ) -> Self {
        Self {
            history: HistoryStore::new(baseline),
            hooks,
            dispatcher,
            events,
        }
    }

    /// Record a version for the just-completed invocation and fan out
    /// analyses.
    ///
    /// The step counter advances only after the version is appended, so
    /// a failed save hook cannot leave a gap in the sequence.
    #[instrument(skip(self, session, analyses))]
    pub(crate) fn checkpoint(
        &mut self,
        session: &mut SessionState<S>,
        analyses: &[AnalysisEntry<S>],
        name: &str,
    ) -> Result<VersionKey> {
        let key = VersionKey::new(session.step() + 1, name);
        let data = Arc::new(session.data().clone());

        let version = match &self.hooks {
            Some(hooks) => {
                let view = self.history.view();
                let token = (hooks.save)(data.as_ref(), &key, &view).map_err(|source| {
                    ModelError::SaveHookFailed {
                        key: key.clone(),
                        source: source.into(),
                    }
                })?;
                Version::tokenized(key.clone(), token)
            }
            None => Version::inline(key.clone(), Arc::clone(&data)),
        };

        self.history.append(version);
        session.advance_to(key.step);
        debug!(key = %key, "checkpoint recorded");
        let _ = self.events.send(ModelEvent::CheckpointCreated { key: key.clone() });

        let view = self.history.view();
        self.dispatcher.run_all(analyses, data.as_ref(), &view, &key);

        Ok(key)
    }

    /// Materialize the data recorded at `key`: through the restore hook
    /// when hooks are configured, else from the in-memory snapshot.
    pub(crate) fn restore(&self, key: &VersionKey) -> Result<S> {
        let version = self
            .history
            .get(key)
            .ok_or_else(|| ModelError::UnknownVersion(key.clone()))?;

        match (&self.hooks, version.data()) {
            (Some(hooks), _) => {
                let view = self.history.view();
                (hooks.restore)(key, &view).map_err(|source| ModelError::RestoreHookFailed {
                    key: key.clone(),
                    source: source.into(),
                })
            }
            (None, Some(data)) => Ok(data.clone()),
            (None, None) => Err(ModelError::RestoreHookFailed {
                key: key.clone(),
                source: "version holds a save token but no restore hook is configured".into(),
            }),
        }
    }

    /// The construction-time working data; always held in memory and
    /// never routed through the hooks.
    pub(crate) fn baseline(&self) -> S {
        self.history.baseline().as_ref().clone()
    }

    pub(crate) fn version_at_step(&self, step: u64) -> Option<&Version<S>> {
        self.history.at_step(step)
    }

    pub(crate) fn view(&self) -> HistoryView<S> {
        self.history.view()
    }

    pub(crate) fn dispatcher(&self) -> &AnalysisDispatcher {
        &self.dispatcher
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::events;

    fn coordinator(hooks: Option<SnapshotHooks<i64>>) -> CheckpointCoordinator<i64> {
        let events = events::channel();
        let dispatcher = AnalysisDispatcher::new(Some(1), events.clone()).unwrap();
        CheckpointCoordinator::new(Arc::new(0_i64), hooks, dispatcher, events)
    }

    fn shared_store() -> Arc<Mutex<HashMap<String, i64>>> {
        Arc::new(Mutex::new(HashMap::new()))
    }

    fn file_like_hooks(store: &Arc<Mutex<HashMap<String, i64>>>) -> SnapshotHooks<i64> {
        let saves = Arc::clone(store);
        let restores = Arc::clone(store);
        SnapshotHooks {
            save: Arc::new(move |data, key, _history| {
                let token = format!("blob-{}", key.step);
                saves.lock().unwrap().insert(token.clone(), *data);
                Ok(token)
            }),
            restore: Arc::new(move |key, history| {
                let token = history
                    .get(key)
                    .and_then(Version::save_token)
                    .ok_or_else(|| anyhow::anyhow!("no token for {key}"))?;
                restores
                    .lock()
                    .unwrap()
                    .get(token)
                    .copied()
                    .ok_or_else(|| anyhow::anyhow!("missing blob {token}"))
            }),
        }
    }

    #[test]
    fn test_in_memory_checkpoint_and_restore() {
        let mut coordinator = coordinator(None);
        let mut session = SessionState::new(5_i64);

        session.replace(10);
        let key = coordinator.checkpoint(&mut session, &[], "scale").unwrap();

        assert_eq!(key, VersionKey::new(1, "scale"));
        assert_eq!(session.step(), 1);
        assert_eq!(coordinator.restore(&key).unwrap(), 10);
    }

    #[test]
    fn test_hooked_checkpoint_stores_token_and_restores() {
        let store = shared_store();
        let mut coordinator = coordinator(Some(file_like_hooks(&store)));
        let mut session = SessionState::new(5_i64);

        session.replace(10);
        let key = coordinator.checkpoint(&mut session, &[], "scale").unwrap();

        let view = coordinator.view();
        let version = view.get(&key).unwrap();
        assert!(version.data().is_none());
        assert_eq!(version.save_token(), Some("blob-1"));
        assert_eq!(coordinator.restore(&key).unwrap(), 10);
    }

    #[test]
    fn test_failed_save_hook_leaves_no_gap() {
        let hooks = SnapshotHooks {
            save: Arc::new(|_, _, _| Err(anyhow::anyhow!("disk full"))),
            restore: Arc::new(|_, _| Err(anyhow::anyhow!("unreachable"))),
        };
        let mut coordinator = coordinator(Some(hooks));
        let mut session = SessionState::new(5_i64);

        let result = coordinator.checkpoint(&mut session, &[], "scale");
        assert!(matches!(result, Err(ModelError::SaveHookFailed { .. })));
        assert_eq!(session.step(), 0);
        assert!(coordinator.view().is_empty());
    }

    #[test]
    fn test_restore_unknown_version() {
        let coordinator = coordinator(None);
        let result = coordinator.restore(&VersionKey::new(3, "scale"));
        assert!(matches!(result, Err(ModelError::UnknownVersion(_))));
    }
}
