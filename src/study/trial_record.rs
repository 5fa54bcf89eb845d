//! Trial Record - one evaluation within a study

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{Distribution, ParamValue};
use crate::journal::float_codec;

/// State of a trial.
///
/// Journal codes follow Optuna's `TrialState` numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrialState {
    /// Trial is being evaluated.
    Running,
    /// Trial finished with objective values.
    Complete,
    /// Trial was stopped early by a pruner.
    Pruned,
    /// Trial raised an error or returned an invalid value.
    Fail,
    /// Trial is enqueued and waiting for a worker.
    Waiting,
}

impl TrialState {
    /// Map a journal state code onto a state.
    #[must_use]
    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::Running),
            1 => Some(Self::Complete),
            2 => Some(Self::Pruned),
            3 => Some(Self::Fail),
            4 => Some(Self::Waiting),
            _ => None,
        }
    }

    /// Map an uppercase state name (`"COMPLETE"`, ...) onto a state.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "RUNNING" => Some(Self::Running),
            "COMPLETE" => Some(Self::Complete),
            "PRUNED" => Some(Self::Pruned),
            "FAIL" => Some(Self::Fail),
            "WAITING" => Some(Self::Waiting),
            _ => None,
        }
    }

    /// Whether the trial reached a terminal state.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Complete | Self::Pruned | Self::Fail)
    }
}

/// A sampled parameter of a trial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialParam {
    name: String,
    value: ParamValue,
    #[serde(serialize_with = "float_codec::serialize_f64")]
    internal: f64,
    distribution: Distribution,
}

impl TrialParam {
    /// Create a param from its external value, internal value and distribution.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        value: ParamValue,
        internal: f64,
        distribution: Distribution,
    ) -> Self {
        Self {
            name: name.into(),
            value,
            internal,
            distribution,
        }
    }

    /// Get the param name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the external (user-facing) value.
    #[must_use]
    pub const fn value(&self) -> &ParamValue {
        &self.value
    }

    /// Get the internal (storage) representation.
    #[must_use]
    pub const fn internal(&self) -> f64 {
        self.internal
    }

    /// Get the distribution the value was drawn from.
    #[must_use]
    pub const fn distribution(&self) -> &Distribution {
        &self.distribution
    }
}

/// Trial Record represents a single evaluation of a study's objective.
///
/// Trials are created by replaying a journal; the builder exists for
/// assembling trials directly, e.g. in fixtures.
#[derive(Debug, Clone, Serialize)]
pub struct Trial {
    trial_id: usize,
    number: usize,
    state: TrialState,
    #[serde(serialize_with = "float_codec::serialize_values")]
    values: Vec<f64>,
    #[serde(serialize_with = "float_codec::serialize_steps")]
    intermediate_values: BTreeMap<u64, f64>,
    params: Vec<TrialParam>,
    user_attrs: BTreeMap<String, Value>,
    system_attrs: BTreeMap<String, Value>,
    #[serde(serialize_with = "float_codec::serialize_opt_values")]
    constraints: Option<Vec<f64>>,
    datetime_start: Option<NaiveDateTime>,
    datetime_complete: Option<NaiveDateTime>,
}

impl Trial {
    /// Create an empty trial in the given state.
    ///
    /// # Arguments
    ///
    /// * `trial_id` - Journal-wide trial identifier
    /// * `number` - Position of the trial within its study
    /// * `state` - Initial state
    #[must_use]
    pub const fn new(trial_id: usize, number: usize, state: TrialState) -> Self {
        Self {
            trial_id,
            number,
            state,
            values: Vec::new(),
            intermediate_values: BTreeMap::new(),
            params: Vec::new(),
            user_attrs: BTreeMap::new(),
            system_attrs: BTreeMap::new(),
            constraints: None,
            datetime_start: None,
            datetime_complete: None,
        }
    }

    /// Create a builder for constructing a trial with optional fields.
    #[must_use]
    pub const fn builder(trial_id: usize, number: usize) -> TrialBuilder {
        TrialBuilder::new(trial_id, number)
    }

    /// Get the journal-wide trial ID.
    #[must_use]
    pub const fn trial_id(&self) -> usize {
        self.trial_id
    }

    /// Get the trial number within its study.
    #[must_use]
    pub const fn number(&self) -> usize {
        self.number
    }

    /// Get the current state.
    #[must_use]
    pub const fn state(&self) -> TrialState {
        self.state
    }

    /// Get the objective values, one per study direction once set.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Get the objective value of a single-objective trial.
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        match self.values.as_slice() {
            [value] => Some(*value),
            _ => None,
        }
    }

    /// Get intermediate values, iterated in step order.
    #[must_use]
    pub const fn intermediate_values(&self) -> &BTreeMap<u64, f64> {
        &self.intermediate_values
    }

    /// Get the sampled params in the order they were first set.
    #[must_use]
    pub fn params(&self) -> &[TrialParam] {
        &self.params
    }

    /// Get the external value of a param by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.find_param(name).map(TrialParam::value)
    }

    /// Get the distribution of a param by name.
    #[must_use]
    pub fn distribution(&self, name: &str) -> Option<&Distribution> {
        self.find_param(name).map(TrialParam::distribution)
    }

    fn find_param(&self, name: &str) -> Option<&TrialParam> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Get user attributes.
    #[must_use]
    pub const fn user_attrs(&self) -> &BTreeMap<String, Value> {
        &self.user_attrs
    }

    /// Get system attributes.
    #[must_use]
    pub const fn system_attrs(&self) -> &BTreeMap<String, Value> {
        &self.system_attrs
    }

    /// Get constraint values, present only in constrained optimization.
    #[must_use]
    pub fn constraints(&self) -> Option<&[f64]> {
        self.constraints.as_deref()
    }

    /// Whether every constraint is satisfied (`<= 0`).
    ///
    /// Unconstrained trials are feasible.
    #[must_use]
    pub fn is_feasible(&self) -> bool {
        self.constraints
            .as_deref()
            .map_or(true, |cs| cs.iter().all(|&c| c <= 0.0))
    }

    /// Get the start timestamp, if recorded.
    #[must_use]
    pub const fn datetime_start(&self) -> Option<NaiveDateTime> {
        self.datetime_start
    }

    /// Get the completion timestamp, if recorded.
    #[must_use]
    pub const fn datetime_complete(&self) -> Option<NaiveDateTime> {
        self.datetime_complete
    }

    /// Wall-clock duration of a finished trial.
    #[must_use]
    pub fn duration(&self) -> Option<TimeDelta> {
        Some(self.datetime_complete? - self.datetime_start?)
    }

    pub(crate) fn set_state(&mut self, state: TrialState) {
        self.state = state;
    }

    pub(crate) fn set_values(&mut self, values: Vec<f64>) {
        self.values = values;
    }

    /// Insert or overwrite a param, keeping its original position.
    pub(crate) fn set_param(&mut self, param: TrialParam) {
        match self.params.iter_mut().find(|p| p.name == param.name) {
            Some(existing) => *existing = param,
            None => self.params.push(param),
        }
    }

    pub(crate) fn set_intermediate_value(&mut self, step: u64, value: f64) {
        self.intermediate_values.insert(step, value);
    }

    pub(crate) fn set_user_attr(&mut self, key: String, value: Value) {
        self.user_attrs.insert(key, value);
    }

    pub(crate) fn set_system_attr(&mut self, key: String, value: Value) {
        self.system_attrs.insert(key, value);
    }

    pub(crate) fn set_constraints(&mut self, constraints: Vec<f64>) {
        self.constraints = Some(constraints);
    }

    pub(crate) fn set_datetime_start(&mut self, at: NaiveDateTime) {
        self.datetime_start = Some(at);
    }

    pub(crate) fn set_datetime_complete(&mut self, at: NaiveDateTime) {
        self.datetime_complete = Some(at);
    }
}

/// Builder for `Trial`.
#[derive(Debug)]
pub struct TrialBuilder {
    trial: Trial,
}

impl TrialBuilder {
    /// Create a new builder with required fields; the state defaults to Running.
    #[must_use]
    pub const fn new(trial_id: usize, number: usize) -> Self {
        Self {
            trial: Trial::new(trial_id, number, TrialState::Running),
        }
    }

    /// Set the state.
    #[must_use]
    pub const fn state(mut self, state: TrialState) -> Self {
        self.trial.state = state;
        self
    }

    /// Set the objective values.
    #[must_use]
    pub fn values(mut self, values: Vec<f64>) -> Self {
        self.trial.values = values;
        self
    }

    /// Add a param.
    #[must_use]
    pub fn param(mut self, param: TrialParam) -> Self {
        self.trial.set_param(param);
        self
    }

    /// Add an intermediate value.
    #[must_use]
    pub fn intermediate_value(mut self, step: u64, value: f64) -> Self {
        self.trial.set_intermediate_value(step, value);
        self
    }

    /// Add a user attribute.
    #[must_use]
    pub fn user_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        self.trial.set_user_attr(key.into(), value);
        self
    }

    /// Add a system attribute.
    #[must_use]
    pub fn system_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        self.trial.set_system_attr(key.into(), value);
        self
    }

    /// Set constraint values.
    #[must_use]
    pub fn constraints(mut self, constraints: Vec<f64>) -> Self {
        self.trial.set_constraints(constraints);
        self
    }

    /// Build the `Trial`.
    #[must_use]
    pub fn build(self) -> Trial {
        self.trial
    }
}
