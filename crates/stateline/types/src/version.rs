//! Version identity for checkpointed states.

use serde::{Deserialize, Serialize};

/// Identity of a recorded version: a strictly increasing step paired with
/// the name of the invocation that was checkpointed.
///
/// Steps are assigned by the checkpoint coordinator and are gap-free
/// within a session; step 0 is reserved for the construction-time
/// baseline and never appears in the history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionKey {
    /// Position in the session's checkpoint sequence, starting at 1.
    pub step: u64,

    /// Name of the registered function whose invocation produced this
    /// version.
    pub name: String,
}

impl VersionKey {
    /// Create a key for `name` at `step`.
    pub fn new(step: u64, name: impl Into<String>) -> Self {
        Self {
            step,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for VersionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.step)
    }
}
