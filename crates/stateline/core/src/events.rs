//! Lifecycle and analysis events emitted by the model.
//!
//! Analysis failures are non-fatal by contract; this channel is the
//! structured surface they are reported on, alongside the tracing log.
//! Sends are best-effort: with no subscriber, events are dropped.

use stateline_types::VersionKey;
use tokio::sync::broadcast;

/// Capacity of the event channel. Slow subscribers that fall further
/// behind than this observe a `Lagged` error, not blocked senders.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events emitted by a model. Subscribe with `Model::subscribe`.
#[derive(Debug, Clone)]
pub enum ModelEvent {
    /// A new version was appended to the history.
    CheckpointCreated { key: VersionKey },

    /// An analysis returned an error or its task panicked. Sibling
    /// analyses are unaffected.
    AnalysisFailed {
        analysis: String,
        key: VersionKey,
        reason: String,
    },

    /// Working data was restored to an earlier version.
    RolledBack { key: VersionKey },

    /// A unique business-logic step was re-dispatched and skipped.
    DispatchSkipped { name: String },
}

pub(crate) fn channel() -> broadcast::Sender<ModelEvent> {
    broadcast::channel(EVENT_CHANNEL_CAPACITY).0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_without_subscriber_is_dropped() {
        let tx = channel();
        let result = tx.send(ModelEvent::DispatchSkipped {
            name: "report".to_string(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_subscriber_receives_events() {
        let tx = channel();
        let mut rx = tx.subscribe();

        let _ = tx.send(ModelEvent::CheckpointCreated {
            key: VersionKey::new(1, "scale"),
        });

        match rx.try_recv() {
            Ok(ModelEvent::CheckpointCreated { key }) => {
                assert_eq!(key, VersionKey::new(1, "scale"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
