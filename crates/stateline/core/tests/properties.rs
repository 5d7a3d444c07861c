//! Property tests for the history and rollback invariants: arbitrary
//! interleavings of checkpointed commits, quiet commits, and rollbacks
//! must keep the version sequence gap-free and every recorded state
//! reproducible.

use proptest::prelude::*;
use serde_json::json;
use stateline_core::{Model, ModelError, ModifierAttrs, Version};

#[derive(Debug, Clone)]
enum SessionOp {
    /// Checkpointed commit overwriting the value.
    Set(i64),
    /// Un-checkpointed commit shifting the value.
    Shift(i64),
    /// Attempted rollback; out-of-range attempts are allowed and must
    /// fail cleanly.
    Rollback(u64),
}

fn session_ops() -> impl Strategy<Value = Vec<SessionOp>> {
    proptest::collection::vec(
        prop_oneof![
            (-1000i64..1000).prop_map(SessionOp::Set),
            (-1000i64..1000).prop_map(SessionOp::Shift),
            (0u64..6).prop_map(SessionOp::Rollback),
        ],
        0..24,
    )
}

fn value_model() -> Model<i64> {
    let mut model = Model::new(0_i64).unwrap();
    model
        .register_data_modifier("set", ModifierAttrs { checkpointed: true }, |_, params| {
            Ok(params.as_i64().unwrap_or(0))
        })
        .unwrap();
    model
        .register_data_modifier("shift", ModifierAttrs::default(), |data, params| {
            Ok(data + params.as_i64().unwrap_or(0))
        })
        .unwrap();
    model
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn property_history_steps_are_gap_free(ops in session_ops()) {
        let mut model = value_model();
        let mut recorded = 0u64;

        for op in ops {
            match op {
                SessionOp::Set(value) => {
                    model.commit("set", json!(value)).unwrap();
                    recorded += 1;
                }
                SessionOp::Shift(delta) => {
                    model.commit("shift", json!(delta)).unwrap();
                }
                SessionOp::Rollback(n) => {
                    match model.rollback(n) {
                        Ok(_) => prop_assert!(n <= model.current_step()),
                        Err(ModelError::OutOfRange { requested, current }) => {
                            prop_assert_eq!(requested, n);
                            prop_assert!(n > current);
                        }
                        Err(other) => prop_assert!(false, "unexpected error: {other}"),
                    }
                }
            }

            // Rollbacks never rewind the counter or shrink the history.
            prop_assert_eq!(model.current_step(), recorded);
            prop_assert_eq!(model.history().len() as u64, recorded);
        }

        let steps: Vec<u64> = model.history().iter().map(Version::step).collect();
        let expected: Vec<u64> = (1..=recorded).collect();
        prop_assert_eq!(steps, expected);
    }

    #[test]
    fn property_every_recorded_state_is_reproducible(ops in session_ops()) {
        let mut model = value_model();
        let mut recorded: Vec<i64> = Vec::new();

        for op in ops {
            match op {
                SessionOp::Set(value) => {
                    model.commit("set", json!(value)).unwrap();
                    recorded.push(value);
                }
                SessionOp::Shift(delta) => {
                    model.commit("shift", json!(delta)).unwrap();
                }
                SessionOp::Rollback(n) => {
                    let _ = model.rollback(n);
                }
            }
        }

        // Every version still reproduces exactly the data it recorded,
        // regardless of the rollbacks that happened in between.
        let keys: Vec<_> = model.history().keys().cloned().collect();
        prop_assert_eq!(keys.len(), recorded.len());
        for (key, expected) in keys.iter().zip(&recorded) {
            model.revert_to_version(key).unwrap();
            prop_assert_eq!(model.current_data(), *expected);
        }

        // Rolling all the way back lands on the construction-time value.
        let full = model.current_step();
        model.rollback(full).unwrap();
        prop_assert_eq!(model.current_data(), 0);
    }
}
