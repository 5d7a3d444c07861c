//! Analysis dispatch: sequential observers on the caller's thread,
//! parallelizable observers on a dedicated worker pool.
//!
//! Every analysis receives its own copy of the checkpointed data and a
//! shared read-only history view. Failures are isolated per analysis:
//! logged, broadcast on the event channel, never propagated to the
//! invocation funnel and never fatal to siblings.

use std::sync::{Mutex, MutexGuard};

use stateline_types::{ModelError, Result, VersionKey};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::events::ModelEvent;
use crate::history::HistoryView;
use crate::registry::{AnalysisEntry, AnalysisFn};

/// Worker pool and submission bookkeeping for parallel analyses.
///
/// `run_all` returns once sequential analyses have finished and parallel
/// ones are submitted; parallel analyses may still be running afterwards.
/// `wait_all` is the deterministic join point. Dropping the dispatcher
/// abandons in-flight work without blocking the host.
pub(crate) struct AnalysisDispatcher {
    // Some until drop; drop takes the runtime to shut it down.
    pool: Option<Runtime>,
    in_flight: Mutex<Vec<InFlight>>,
    events: broadcast::Sender<ModelEvent>,
}

struct InFlight {
    analysis: String,
    key: VersionKey,
    handle: JoinHandle<()>,
}

impl AnalysisDispatcher {
    pub(crate) fn new(
        worker_threads: Option<usize>,
        events: broadcast::Sender<ModelEvent>,
    ) -> Result<Self> {
        if worker_threads == Some(0) {
            return Err(ModelError::Configuration(
                "analysis worker pool size must be nonzero".to_string(),
            ));
        }

        let mut builder = Builder::new_multi_thread();
        builder.thread_name("stateline-analysis");
        if let Some(count) = worker_threads {
            builder.worker_threads(count);
        }
        let pool = builder.build().map_err(|err| {
            ModelError::Configuration(format!("analysis worker pool: {err}"))
        })?;

        Ok(Self {
            pool: Some(pool),
            in_flight: Mutex::new(Vec::new()),
            events,
        })
    }

    fn pool(&self) -> &Runtime {
        // Invariant: `pool` is Some for the dispatcher's whole life;
        // only `drop` takes it.
        match &self.pool {
            Some(pool) => pool,
            None => unreachable!("analysis pool taken before drop"),
        }
    }

    fn in_flight(&self) -> MutexGuard<'_, Vec<InFlight>> {
        match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Run every registered analysis against the checkpointed state.
    ///
    /// Parallelizable analyses are submitted to the pool first so they
    /// overlap with the sequential pass; sequential analyses then run on
    /// the caller's thread in registration order.
    pub(crate) fn run_all<S>(
        &self,
        entries: &[AnalysisEntry<S>],
        data: &S,
        view: &HistoryView<S>,
        key: &VersionKey,
    ) where
        S: Clone + Send + Sync + 'static,
    {
        {
            let mut in_flight = self.in_flight();
            in_flight.retain(|task| !task.handle.is_finished());

            for entry in entries.iter().filter(|e| e.attrs.parallelizable) {
                let func = AnalysisFn::clone(&entry.func);
                let name = entry.name.clone();
                let data = data.clone();
                let view = view.clone();
                let key = key.clone();
                let events = self.events.clone();

                let handle = self.pool().spawn(async move {
                    run_one(&name, &func, data, view, &key, &events);
                });
                in_flight.push(InFlight {
                    analysis: entry.name.clone(),
                    key: key.clone(),
                    handle,
                });
            }
        }

        for entry in entries.iter().filter(|e| !e.attrs.parallelizable) {
            run_one(&entry.name, &entry.func, data.clone(), view.clone(), key, &self.events);
        }
    }

    /// Block until every submitted parallel analysis has finished.
    ///
    /// A task that panicked is reported like any other analysis failure.
    pub(crate) fn wait_all(&self) {
        let drained = std::mem::take(&mut *self.in_flight());
        for task in drained {
            if let Err(err) = self.pool().block_on(task.handle) {
                let reason = if err.is_panic() {
                    "analysis task panicked".to_string()
                } else {
                    err.to_string()
                };
                tracing::warn!(
                    analysis = %task.analysis,
                    key = %task.key,
                    %reason,
                    "parallel analysis did not complete cleanly"
                );
                let _ = self.events.send(ModelEvent::AnalysisFailed {
                    analysis: task.analysis,
                    key: task.key,
                    reason,
                });
            }
        }
    }
}

impl Drop for AnalysisDispatcher {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            // Abandon in-flight analyses rather than blocking teardown.
            pool.shutdown_background();
        }
    }
}

fn run_one<S>(
    name: &str,
    func: &AnalysisFn<S>,
    data: S,
    view: HistoryView<S>,
    key: &VersionKey,
    events: &broadcast::Sender<ModelEvent>,
) where
    S: Clone + Send + Sync + 'static,
{
    if let Err(err) = func(data, view) {
        tracing::warn!(analysis = %name, key = %key, error = %err, "analysis failed");
        let _ = events.send(ModelEvent::AnalysisFailed {
            analysis: name.to_string(),
            key: key.clone(),
            reason: err.to_string(),
        });
    }
}
