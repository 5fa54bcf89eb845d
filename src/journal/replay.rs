//! Replay engine - applies decoded operations to an in-memory registry
//!
//! Studies live in an arena indexed by `study_id` (their creation-order
//! position); a deleted study leaves a tombstone so ids are never reused.
//! Trials are owned by their study and indexed journal-wide by `trial_id`
//! through a second arena of `(study_id, number)` references.
//!
//! Every operation is validated against the current state before anything
//! is mutated, so a rejected operation has no effect.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::float_codec;
use super::operation::{OpCode, Operation, TrialPayload};
use crate::study::{
    Study, StudyDirection, Trial, TrialState, CONSTRAINTS_KEY, METRIC_NAMES_KEY,
};

/// An operation that decoded fine but cannot be applied to the current state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// Study id was never created
    #[error("{op}: study {study_id} does not exist")]
    UnknownStudy {
        /// Operation being applied
        op: &'static str,
        /// Referenced study
        study_id: usize,
    },

    /// Study id refers to a deleted study
    #[error("{op}: study {study_id} has been deleted")]
    DeletedStudy {
        /// Operation being applied
        op: &'static str,
        /// Referenced study
        study_id: usize,
    },

    /// Trial id was never created
    #[error("{op}: trial {trial_id} does not exist")]
    UnknownTrial {
        /// Operation being applied
        op: &'static str,
        /// Referenced trial
        trial_id: usize,
    },

    /// Trial exists but its study has been deleted
    #[error("{op}: trial {trial_id} belongs to deleted study {study_id}")]
    OrphanedTrial {
        /// Operation being applied
        op: &'static str,
        /// Referenced trial
        trial_id: usize,
        /// Owning study
        study_id: usize,
    },

    /// Trial is in a terminal state and can no longer change
    #[error("{op}: trial {trial_id} has already finished ({state:?})")]
    TrialFinished {
        /// Operation being applied
        op: &'static str,
        /// Referenced trial
        trial_id: usize,
        /// Terminal state
        state: TrialState,
    },

    /// A second worker tried to start a trial that is already running
    #[error("SetTrialStateValues: trial {trial_id} is already running")]
    AlreadyRunning {
        /// Referenced trial
        trial_id: usize,
    },

    /// More objective values than the study has directions
    #[error("{op}: {count} value(s) exceed the study's {objectives} objective(s)")]
    TooManyValues {
        /// Operation being applied
        op: &'static str,
        /// Values supplied
        count: usize,
        /// Study objective count
        objectives: usize,
    },

    /// `study:metric_names` is malformed or does not match the directions
    #[error("SetStudySystemAttr: invalid metric names: {0}")]
    InvalidMetricNames(String),

    /// Directions were already declared and the record would change them
    #[error("SetStudyDirections: study {study_id} already has directions {current:?}")]
    DirectionsAlreadySet {
        /// Target study
        study_id: usize,
        /// Directions in effect
        current: Vec<StudyDirection>,
    },

    /// New directions do not match the study's declared metric names
    #[error("SetStudyDirections: {objectives} objective(s) conflict with {names} metric name(s)")]
    MetricNamesMismatch {
        /// Declared metric names
        names: usize,
        /// Requested objective count
        objectives: usize,
    },

    /// `constraints` is malformed or does not match the study's arity
    #[error("{op}: invalid constraints: {reason}")]
    InvalidConstraints {
        /// Operation being applied
        op: &'static str,
        /// What was wrong
        reason: String,
    },
}

#[derive(Debug, Clone, Copy)]
struct TrialRef {
    study_id: usize,
    number: usize,
}

/// Sequential state machine over decoded operations.
///
/// ```rust
/// use trueno_journal::journal::{Operation, ReplayEngine};
/// use trueno_journal::study::StudyDirection;
///
/// let mut engine = ReplayEngine::new();
/// engine.apply(Operation::CreateStudy {
///     name: "demo".to_string(),
///     directions: vec![StudyDirection::Minimize],
/// })?;
/// assert!(engine.apply(Operation::DeleteStudy { study_id: 7 }).is_err());
///
/// let studies = engine.finish();
/// assert_eq!(studies.len(), 1);
/// # Ok::<(), trueno_journal::journal::ReplayError>(())
/// ```
#[derive(Debug, Default)]
pub struct ReplayEngine {
    studies: Vec<Option<Study>>,
    trials: Vec<TrialRef>,
    applied: usize,
}

impl ReplayEngine {
    /// Create an engine with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of studies ever created, deleted ones included.
    #[must_use]
    pub fn created_study_count(&self) -> usize {
        self.studies.len()
    }

    /// Number of trials ever created, journal-wide.
    #[must_use]
    pub fn trial_count(&self) -> usize {
        self.trials.len()
    }

    /// Number of operations applied successfully.
    #[must_use]
    pub const fn applied_count(&self) -> usize {
        self.applied
    }

    /// Get a live study by id.
    #[must_use]
    pub fn study(&self, study_id: usize) -> Option<&Study> {
        self.studies.get(study_id).and_then(Option::as_ref)
    }

    /// Apply one operation.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError`] when the operation references an unknown or
    /// deleted study or trial, or would break a study invariant. The
    /// registry is left untouched in that case.
    pub fn apply(&mut self, operation: Operation) -> Result<(), ReplayError> {
        let op = operation.op_code();
        match operation {
            Operation::CreateStudy { name, directions } => {
                let study_id = self.studies.len();
                debug!(study_id, name = %name, "study created");
                self.studies.push(Some(Study::new(study_id, name, directions)));
            }
            Operation::DeleteStudy { study_id } => {
                self.study_mut(op, study_id)?;
                self.studies[study_id] = None;
                debug!(study_id, "study deleted");
            }
            Operation::SetStudyUserAttr {
                study_id,
                key,
                value,
            } => {
                self.study_mut(op, study_id)?.set_user_attr(key, value);
            }
            Operation::SetStudySystemAttr {
                study_id,
                key,
                value,
            } => {
                let study = self.study_mut(op, study_id)?;
                if key == METRIC_NAMES_KEY {
                    let names = metric_names(&value, study.directions())?;
                    study.set_metric_names(names);
                }
                study.set_system_attr(key, value);
            }
            Operation::SetStudyDirections {
                study_id,
                directions,
            } => {
                let study = self.study_mut(op, study_id)?;
                check_directions(study, &directions)?;
                study.set_directions(directions);
            }
            Operation::CreateTrial {
                study_id,
                initial_state,
                payload,
            } => {
                let trial_id = self.trials.len();
                let study = self.study_mut(op, study_id)?;
                let number = study.trials().len();
                let trial = build_trial(study, trial_id, number, initial_state, *payload)?;
                study.push_trial(trial);
                self.trials.push(TrialRef { study_id, number });
                debug!(study_id, trial_id, number, "trial created");
            }
            Operation::SetTrialParam { trial_id, param } => {
                self.updatable_trial(op, trial_id)?.set_param(param);
            }
            Operation::SetTrialStateValues {
                trial_id,
                state,
                values,
                datetime_start,
                datetime_complete,
            } => {
                let (study, number) = self.locate(op, trial_id)?;
                let objectives = study.objective_count();
                let trial = updatable(study, op, trial_id, number)?;

                if trial.state() == TrialState::Running && state == TrialState::Running {
                    return Err(ReplayError::AlreadyRunning { trial_id });
                }
                if let Some(values) = &values {
                    check_value_count(op, values.len(), objectives)?;
                }

                trial.set_state(state);
                if let Some(values) = values {
                    trial.set_values(values);
                }
                if let Some(at) = datetime_start {
                    trial.set_datetime_start(at);
                }
                if let Some(at) = datetime_complete {
                    trial.set_datetime_complete(at);
                }
            }
            Operation::SetTrialIntermediateValue {
                trial_id,
                step,
                value,
            } => {
                self.updatable_trial(op, trial_id)?
                    .set_intermediate_value(step, value);
            }
            Operation::SetTrialUserAttr {
                trial_id,
                key,
                value,
            } => {
                self.updatable_trial(op, trial_id)?.set_user_attr(key, value);
            }
            Operation::SetTrialSystemAttr {
                trial_id,
                key,
                value,
            } => {
                let (study, number) = self.locate(op, trial_id)?;
                let arity = study.constraint_arity();
                let trial = updatable(study, op, trial_id, number)?;
                if key == CONSTRAINTS_KEY {
                    trial.set_constraints(constraints(op, &value, arity)?);
                }
                trial.set_system_attr(key, value);
            }
        }

        self.applied += 1;
        Ok(())
    }

    /// Consume the engine, returning live studies in creation order.
    #[must_use]
    pub fn finish(self) -> Vec<Study> {
        self.studies.into_iter().flatten().collect()
    }

    fn study_mut(&mut self, op: OpCode, study_id: usize) -> Result<&mut Study, ReplayError> {
        match self.studies.get_mut(study_id) {
            Some(Some(study)) => Ok(study),
            Some(None) => Err(ReplayError::DeletedStudy {
                op: op.name(),
                study_id,
            }),
            None => Err(ReplayError::UnknownStudy {
                op: op.name(),
                study_id,
            }),
        }
    }

    fn locate(&mut self, op: OpCode, trial_id: usize) -> Result<(&mut Study, usize), ReplayError> {
        let TrialRef { study_id, number } =
            *self
                .trials
                .get(trial_id)
                .ok_or(ReplayError::UnknownTrial {
                    op: op.name(),
                    trial_id,
                })?;
        match self.studies.get_mut(study_id) {
            Some(Some(study)) => Ok((study, number)),
            _ => Err(ReplayError::OrphanedTrial {
                op: op.name(),
                trial_id,
                study_id,
            }),
        }
    }

    fn updatable_trial(&mut self, op: OpCode, trial_id: usize) -> Result<&mut Trial, ReplayError> {
        let (study, number) = self.locate(op, trial_id)?;
        updatable(study, op, trial_id, number)
    }
}

fn updatable(
    study: &mut Study,
    op: OpCode,
    trial_id: usize,
    number: usize,
) -> Result<&mut Trial, ReplayError> {
    let trial = study.trial_mut(number).ok_or(ReplayError::UnknownTrial {
        op: op.name(),
        trial_id,
    })?;
    if trial.state().is_finished() {
        return Err(ReplayError::TrialFinished {
            op: op.name(),
            trial_id,
            state: trial.state(),
        });
    }
    Ok(trial)
}

fn build_trial(
    study: &Study,
    trial_id: usize,
    number: usize,
    initial_state: TrialState,
    payload: TrialPayload,
) -> Result<Trial, ReplayError> {
    let op = OpCode::CreateTrial;
    if let Some(values) = &payload.values {
        check_value_count(op, values.len(), study.objective_count())?;
    }
    let constraints = payload
        .system_attrs
        .get(CONSTRAINTS_KEY)
        .map(|value| constraints(op, value, study.constraint_arity()))
        .transpose()?;

    let mut trial = Trial::new(trial_id, number, initial_state);
    if let Some(values) = payload.values {
        trial.set_values(values);
    }
    if let Some(constraints) = constraints {
        trial.set_constraints(constraints);
    }
    for param in payload.params {
        trial.set_param(param);
    }
    for (step, value) in payload.intermediate_values {
        trial.set_intermediate_value(step, value);
    }
    for (key, value) in payload.user_attrs {
        trial.set_user_attr(key, value);
    }
    for (key, value) in payload.system_attrs {
        trial.set_system_attr(key, value);
    }
    if let Some(at) = payload.datetime_start {
        trial.set_datetime_start(at);
    }
    if let Some(at) = payload.datetime_complete {
        trial.set_datetime_complete(at);
    }
    Ok(trial)
}

const fn check_value_count(op: OpCode, count: usize, objectives: usize) -> Result<(), ReplayError> {
    if count > objectives {
        return Err(ReplayError::TooManyValues {
            op: op.name(),
            count,
            objectives,
        });
    }
    Ok(())
}

/// Directions may be declared once, while the study holds none or only
/// `NotSet`; the new arity must fit every recorded value and metric name.
fn check_directions(study: &Study, directions: &[StudyDirection]) -> Result<(), ReplayError> {
    let current = study.directions();
    let declared = current.iter().any(|d| *d != StudyDirection::NotSet);
    if declared && current != directions {
        return Err(ReplayError::DirectionsAlreadySet {
            study_id: study.study_id(),
            current: current.to_vec(),
        });
    }

    let recorded = study.trials().iter().map(|t| t.values().len()).max();
    if let Some(count) = recorded {
        check_value_count(OpCode::SetStudyDirections, count, directions.len())?;
    }

    match study.metric_names() {
        Some(names) if names.len() != directions.len() => Err(ReplayError::MetricNamesMismatch {
            names: names.len(),
            objectives: directions.len(),
        }),
        _ => Ok(()),
    }
}

fn metric_names(value: &Value, directions: &[StudyDirection]) -> Result<Vec<String>, ReplayError> {
    let names = value
        .as_array()
        .and_then(|items| {
            items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
        })
        .ok_or_else(|| {
            ReplayError::InvalidMetricNames(format!("expected a string array, got {value}"))
        })?;
    if names.len() != directions.len() {
        return Err(ReplayError::InvalidMetricNames(format!(
            "{} name(s) for {} objective(s)",
            names.len(),
            directions.len()
        )));
    }
    Ok(names)
}

fn constraints(op: OpCode, value: &Value, arity: Option<usize>) -> Result<Vec<f64>, ReplayError> {
    let invalid = |reason: String| ReplayError::InvalidConstraints {
        op: op.name(),
        reason,
    };
    let values = value
        .as_array()
        .and_then(|items| items.iter().map(float_codec::decode).collect::<Option<Vec<_>>>())
        .ok_or_else(|| invalid(format!("expected a numeric array, got {value}")))?;
    match arity {
        Some(arity) if arity != values.len() => Err(invalid(format!(
            "{} value(s) but the study carries {arity}",
            values.len()
        ))),
        _ => Ok(values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::study::{Distribution, ParamValue, TrialParam};
    use serde_json::json;

    fn create_study(name: &str) -> Operation {
        Operation::CreateStudy {
            name: name.to_string(),
            directions: vec![StudyDirection::Minimize],
        }
    }

    fn create_trial(study_id: usize) -> Operation {
        Operation::CreateTrial {
            study_id,
            initial_state: TrialState::Running,
            payload: Box::default(),
        }
    }

    fn finish(trial_id: usize, values: Vec<f64>) -> Operation {
        Operation::SetTrialStateValues {
            trial_id,
            state: TrialState::Complete,
            values: Some(values),
            datetime_start: None,
            datetime_complete: None,
        }
    }

    fn param(trial_id: usize, name: &str, value: f64) -> Operation {
        Operation::SetTrialParam {
            trial_id,
            param: TrialParam::new(
                name,
                ParamValue::Float(value),
                value,
                Distribution::Float {
                    low: 0.0,
                    high: 1.0,
                    step: None,
                    log: false,
                },
            ),
        }
    }

    fn engine_with(ops: Vec<Operation>) -> ReplayEngine {
        let mut engine = ReplayEngine::new();
        for op in ops {
            engine.apply(op).unwrap();
        }
        engine
    }

    #[test]
    fn test_duplicate_names_are_distinct_studies() {
        let engine = engine_with(vec![create_study("s"), create_study("s")]);
        let studies = engine.finish();
        assert_eq!(studies.len(), 2);
        assert_eq!(studies[0].study_id(), 0);
        assert_eq!(studies[1].study_id(), 1);
    }

    #[test]
    fn test_trial_numbers_per_study_and_ids_global() {
        let engine = engine_with(vec![
            create_study("a"),
            create_study("b"),
            create_trial(0),
            create_trial(1),
            create_trial(0),
        ]);
        assert_eq!(engine.trial_count(), 3);
        let a = engine.study(0).unwrap();
        assert_eq!(a.trials().len(), 2);
        assert_eq!(a.trials()[1].trial_id(), 2);
        assert_eq!(a.trials()[1].number(), 1);
        assert_eq!(engine.study(1).unwrap().trials()[0].trial_id(), 1);
    }

    #[test]
    fn test_delete_study_tombstones_without_reuse() {
        let mut engine = engine_with(vec![create_study("a"), create_trial(0)]);
        engine.apply(Operation::DeleteStudy { study_id: 0 }).unwrap();
        engine.apply(create_study("b")).unwrap();

        assert_eq!(engine.created_study_count(), 2);
        assert!(engine.study(0).is_none());
        assert_eq!(engine.study(1).unwrap().name(), "b");

        assert_eq!(
            engine.apply(create_trial(0)),
            Err(ReplayError::DeletedStudy {
                op: "CreateTrial",
                study_id: 0
            })
        );
        assert_eq!(
            engine.apply(param(0, "x", 0.5)),
            Err(ReplayError::OrphanedTrial {
                op: "SetTrialParam",
                trial_id: 0,
                study_id: 0
            })
        );
    }

    #[test]
    fn test_unknown_references_have_no_effect() {
        let mut engine = engine_with(vec![create_study("a")]);
        assert!(matches!(
            engine.apply(create_trial(5)),
            Err(ReplayError::UnknownStudy { study_id: 5, .. })
        ));
        assert!(matches!(
            engine.apply(param(0, "x", 0.1)),
            Err(ReplayError::UnknownTrial { trial_id: 0, .. })
        ));
        assert_eq!(engine.trial_count(), 0);
        assert_eq!(engine.applied_count(), 1);
    }

    #[test]
    fn test_failed_create_trial_consumes_no_id() {
        let mut engine = engine_with(vec![create_study("a")]);
        let bad = Operation::CreateTrial {
            study_id: 0,
            initial_state: TrialState::Complete,
            payload: Box::new(TrialPayload {
                values: Some(vec![1.0, 2.0]),
                ..TrialPayload::default()
            }),
        };
        assert!(matches!(
            engine.apply(bad),
            Err(ReplayError::TooManyValues { count: 2, objectives: 1, .. })
        ));
        engine.apply(create_trial(0)).unwrap();
        assert_eq!(engine.study(0).unwrap().trials()[0].trial_id(), 0);
    }

    #[test]
    fn test_state_values_and_finished_guard() {
        let mut engine = engine_with(vec![
            create_study("a"),
            create_trial(0),
            param(0, "x", 0.25),
            finish(0, vec![f64::NEG_INFINITY]),
        ]);
        let trial = &engine.study(0).unwrap().trials()[0];
        assert_eq!(trial.state(), TrialState::Complete);
        assert_eq!(trial.values(), &[f64::NEG_INFINITY]);

        assert!(matches!(
            engine.apply(param(0, "x", 0.75)),
            Err(ReplayError::TrialFinished { .. })
        ));
        assert_eq!(
            engine.study(0).unwrap().trials()[0].param("x"),
            Some(&ParamValue::Float(0.25))
        );
    }

    #[test]
    fn test_running_to_running_rejected() {
        let mut engine = engine_with(vec![create_study("a"), create_trial(0)]);
        let restart = Operation::SetTrialStateValues {
            trial_id: 0,
            state: TrialState::Running,
            values: None,
            datetime_start: None,
            datetime_complete: None,
        };
        assert_eq!(
            engine.apply(restart),
            Err(ReplayError::AlreadyRunning { trial_id: 0 })
        );
    }

    #[test]
    fn test_waiting_trial_picked_up() {
        let mut engine = engine_with(vec![create_study("a")]);
        engine
            .apply(Operation::CreateTrial {
                study_id: 0,
                initial_state: TrialState::Waiting,
                payload: Box::default(),
            })
            .unwrap();
        engine
            .apply(Operation::SetTrialStateValues {
                trial_id: 0,
                state: TrialState::Running,
                values: None,
                datetime_start: None,
                datetime_complete: None,
            })
            .unwrap();
        assert_eq!(
            engine.study(0).unwrap().trials()[0].state(),
            TrialState::Running
        );
    }

    #[test]
    fn test_too_many_values_rejected() {
        let mut engine = engine_with(vec![create_study("a"), create_trial(0)]);
        assert!(matches!(
            engine.apply(finish(0, vec![1.0, 2.0])),
            Err(ReplayError::TooManyValues { .. })
        ));
        assert_eq!(
            engine.study(0).unwrap().trials()[0].state(),
            TrialState::Running
        );
    }

    #[test]
    fn test_metric_names() {
        let mut engine = engine_with(vec![create_study("a")]);
        engine
            .apply(Operation::SetStudySystemAttr {
                study_id: 0,
                key: METRIC_NAMES_KEY.to_string(),
                value: json!(["loss"]),
            })
            .unwrap();
        assert_eq!(
            engine.study(0).unwrap().metric_names(),
            Some(&["loss".to_string()][..])
        );

        assert!(matches!(
            engine.apply(Operation::SetStudySystemAttr {
                study_id: 0,
                key: METRIC_NAMES_KEY.to_string(),
                value: json!(["loss", "acc"]),
            }),
            Err(ReplayError::InvalidMetricNames(_))
        ));
    }

    #[test]
    fn test_constraints_arity() {
        let set_constraints = |trial_id, value: Value| Operation::SetTrialSystemAttr {
            trial_id,
            key: CONSTRAINTS_KEY.to_string(),
            value,
        };
        let mut engine = engine_with(vec![
            create_study("a"),
            create_trial(0),
            create_trial(0),
            set_constraints(0, json!([0.5, "-Infinity"])),
        ]);
        assert_eq!(
            engine.study(0).unwrap().trials()[0].constraints(),
            Some(&[0.5, f64::NEG_INFINITY][..])
        );
        assert!(matches!(
            engine.apply(set_constraints(1, json!([0.5]))),
            Err(ReplayError::InvalidConstraints { .. })
        ));
        assert!(engine.study(0).unwrap().trials()[1].constraints().is_none());
        assert!(engine.study(0).unwrap().trials()[1].system_attrs().is_empty());
    }

    #[test]
    fn test_intermediate_values_last_write_wins() {
        let report = |step, value| Operation::SetTrialIntermediateValue {
            trial_id: 0,
            step,
            value,
        };
        let engine = engine_with(vec![
            create_study("a"),
            create_trial(0),
            report(5, 0.5),
            report(1, 0.9),
            report(5, 0.4),
        ]);
        let trial = &engine.study(0).unwrap().trials()[0];
        let steps: Vec<(u64, f64)> = trial
            .intermediate_values()
            .iter()
            .map(|(s, v)| (*s, *v))
            .collect();
        assert_eq!(steps, vec![(1, 0.9), (5, 0.4)]);
    }

    #[test]
    fn test_set_study_directions() {
        let mut engine = engine_with(vec![Operation::CreateStudy {
            name: "late".to_string(),
            directions: vec![],
        }]);
        engine
            .apply(Operation::SetStudyDirections {
                study_id: 0,
                directions: vec![StudyDirection::Minimize, StudyDirection::Maximize],
            })
            .unwrap();
        assert!(engine.study(0).unwrap().is_multi_objective());
    }

    #[test]
    fn test_declared_directions_are_fixed() {
        let mut engine = engine_with(vec![create_study("a")]);
        let redeclare = |directions| Operation::SetStudyDirections {
            study_id: 0,
            directions,
        };
        engine.apply(redeclare(vec![StudyDirection::Minimize])).unwrap();
        assert_eq!(
            engine.apply(redeclare(vec![StudyDirection::Maximize])),
            Err(ReplayError::DirectionsAlreadySet {
                study_id: 0,
                current: vec![StudyDirection::Minimize]
            })
        );
        assert_eq!(
            engine.study(0).unwrap().directions(),
            &[StudyDirection::Minimize]
        );
    }

    #[test]
    fn test_directions_shrink_below_values_rejected() {
        let mut engine = engine_with(vec![Operation::CreateStudy {
            name: "unset".to_string(),
            directions: vec![StudyDirection::NotSet, StudyDirection::NotSet],
        }]);
        engine.apply(create_trial(0)).unwrap();
        engine.apply(finish(0, vec![1.0, 2.0])).unwrap();
        assert!(matches!(
            engine.apply(Operation::SetStudyDirections {
                study_id: 0,
                directions: vec![StudyDirection::Minimize],
            }),
            Err(ReplayError::TooManyValues {
                op: "SetStudyDirections",
                count: 2,
                objectives: 1
            })
        ));
        assert_eq!(engine.study(0).unwrap().objective_count(), 2);
    }
}
