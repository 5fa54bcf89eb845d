//! Study Record - root entity of a reconstructed journal

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::search_space::{self, SearchSpaceEntry};
use super::{Trial, TrialState};

/// Optimization direction of one objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudyDirection {
    /// Direction was never declared.
    NotSet,
    /// Smaller objective values are better.
    Minimize,
    /// Larger objective values are better.
    Maximize,
}

impl StudyDirection {
    /// Map a journal direction code onto a direction.
    #[must_use]
    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::NotSet),
            1 => Some(Self::Minimize),
            2 => Some(Self::Maximize),
            _ => None,
        }
    }

    /// Map a lowercase direction name onto a direction.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "not_set" => Some(Self::NotSet),
            "minimize" => Some(Self::Minimize),
            "maximize" => Some(Self::Maximize),
            _ => None,
        }
    }
}

/// Study Record represents one optimization experiment.
///
/// This is the root entity of the reconstructed state. A study owns its
/// trials; trial numbers equal their position in [`Study::trials`].
#[derive(Debug, Clone, Serialize)]
pub struct Study {
    study_id: usize,
    name: String,
    directions: Vec<StudyDirection>,
    user_attrs: BTreeMap<String, Value>,
    system_attrs: BTreeMap<String, Value>,
    metric_names: Option<Vec<String>>,
    trials: Vec<Trial>,
}

impl Study {
    /// Create a new study with no trials.
    ///
    /// # Arguments
    ///
    /// * `study_id` - Creation-order position of the study in the journal
    /// * `name` - Study name (not necessarily unique)
    /// * `directions` - One direction per objective
    #[must_use]
    pub fn new(study_id: usize, name: impl Into<String>, directions: Vec<StudyDirection>) -> Self {
        Self {
            study_id,
            name: name.into(),
            directions,
            user_attrs: BTreeMap::new(),
            system_attrs: BTreeMap::new(),
            metric_names: None,
            trials: Vec::new(),
        }
    }

    /// Get the study ID.
    #[must_use]
    pub const fn study_id(&self) -> usize {
        self.study_id
    }

    /// Get the study name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the optimization directions.
    #[must_use]
    pub fn directions(&self) -> &[StudyDirection] {
        &self.directions
    }

    /// Number of objectives.
    #[must_use]
    pub fn objective_count(&self) -> usize {
        self.directions.len()
    }

    /// Whether the study optimizes more than one objective.
    #[must_use]
    pub fn is_multi_objective(&self) -> bool {
        self.directions.len() > 1
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

    /// Get objective names, one per direction, if declared.
    #[must_use]
    pub fn metric_names(&self) -> Option<&[String]> {
        self.metric_names.as_deref()
    }

    /// Get all trials ordered by number.
    #[must_use]
    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    /// Get a trial by number.
    #[must_use]
    pub fn trial(&self, number: usize) -> Option<&Trial> {
        self.trials.get(number)
    }

    /// Get trials in the given state.
    #[must_use]
    pub fn trials_in_state(&self, state: TrialState) -> Vec<&Trial> {
        self.trials.iter().filter(|t| t.state() == state).collect()
    }

    /// Number of constraint values carried by this study's trials.
    ///
    /// Fixed by the first trial that reports constraints.
    #[must_use]
    pub fn constraint_arity(&self) -> Option<usize> {
        self.trials.iter().find_map(|t| t.constraints().map(<[f64]>::len))
    }

    /// Earliest trial start time.
    #[must_use]
    pub fn datetime_start(&self) -> Option<NaiveDateTime> {
        self.trials.iter().filter_map(Trial::datetime_start).min()
    }

    /// Best complete trial of a single-objective study.
    ///
    /// NaN values never win. Returns `None` for multi-objective studies or
    /// when no complete trial has a comparable value.
    #[must_use]
    pub fn best_trial(&self) -> Option<&Trial> {
        let [direction] = self.directions.as_slice() else {
            return None;
        };
        let maximize = *direction == StudyDirection::Maximize;

        self.trials
            .iter()
            .filter(|t| t.state() == TrialState::Complete)
            .filter_map(|t| t.value().filter(|v| !v.is_nan()).map(|v| (t, v)))
            .reduce(|best, candidate| {
                let better = if maximize {
                    candidate.1 > best.1
                } else {
                    candidate.1 < best.1
                };
                if better {
                    candidate
                } else {
                    best
                }
            })
            .map(|(trial, _)| trial)
    }

    /// Every `(name, distribution)` pair sampled by at least one trial.
    #[must_use]
    pub fn union_search_space(&self) -> Vec<SearchSpaceEntry> {
        search_space::union_search_space(&self.trials)
    }

    /// `(name, distribution)` pairs sampled identically by every trial.
    #[must_use]
    pub fn intersection_search_space(&self) -> Vec<SearchSpaceEntry> {
        search_space::intersection_search_space(&self.trials)
    }

    /// Summarize the study without its trials.
    #[must_use]
    pub fn summary(&self) -> StudySummary {
        StudySummary {
            study_id: self.study_id,
            name: self.name.clone(),
            directions: self.directions.clone(),
            metric_names: self.metric_names.clone(),
            user_attrs: self.user_attrs.clone(),
            system_attrs: self.system_attrs.clone(),
            is_preferential: self.is_preferential(),
            trial_count: self.trials.len(),
            datetime_start: self.datetime_start(),
        }
    }

    pub(crate) fn set_directions(&mut self, directions: Vec<StudyDirection>) {
        self.directions = directions;
    }

    pub(crate) fn set_user_attr(&mut self, key: String, value: Value) {
        self.user_attrs.insert(key, value);
    }

    pub(crate) fn set_system_attr(&mut self, key: String, value: Value) {
        self.system_attrs.insert(key, value);
    }

    pub(crate) fn set_metric_names(&mut self, names: Vec<String>) {
        self.metric_names = Some(names);
    }

    pub(crate) fn push_trial(&mut self, trial: Trial) {
        self.trials.push(trial);
    }

    pub(crate) fn trial_mut(&mut self, number: usize) -> Option<&mut Trial> {
        self.trials.get_mut(number)
    }

    #[cfg(test)]
    pub(crate) fn with_trials(mut self, trials: Vec<Trial>) -> Self {
        self.trials = trials;
        self
    }
}

/// Study overview as listed by the dashboard, without trials.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudySummary {
    /// Study ID
    pub study_id: usize,
    /// Study name
    pub name: String,
    /// Optimization directions
    pub directions: Vec<StudyDirection>,
    /// Objective names, if declared
    pub metric_names: Option<Vec<String>>,
    /// User attributes
    pub user_attrs: BTreeMap<String, Value>,
    /// System attributes
    pub system_attrs: BTreeMap<String, Value>,
    /// Whether the study collects human preferences instead of values
    pub is_preferential: bool,
    /// Number of trials
    pub trial_count: usize,
    /// Earliest trial start time
    pub datetime_start: Option<NaiveDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(number: usize, value: f64) -> Trial {
        Trial::builder(number, number)
            .state(TrialState::Complete)
            .values(vec![value])
            .build()
    }

    #[test]
    fn test_direction_codes() {
        assert_eq!(StudyDirection::from_code(1), Some(StudyDirection::Minimize));
        assert_eq!(StudyDirection::from_code(2), Some(StudyDirection::Maximize));
        assert_eq!(StudyDirection::from_code(3), None);
        assert_eq!(
            StudyDirection::from_name("maximize"),
            Some(StudyDirection::Maximize)
        );
    }

    #[test]
    fn test_study_new() {
        let study = Study::new(2, "tuning", vec![StudyDirection::Minimize]);
        assert_eq!(study.study_id(), 2);
        assert_eq!(study.name(), "tuning");
        assert_eq!(study.objective_count(), 1);
        assert!(!study.is_multi_objective());
        assert!(study.trials().is_empty());
        assert!(study.metric_names().is_none());
    }

    #[test]
    fn test_best_trial_minimize_skips_nan() {
        let study = Study::new(0, "s", vec![StudyDirection::Minimize]).with_trials(vec![
            complete(0, 3.0),
            complete(1, f64::NAN),
            complete(2, 1.0),
            Trial::builder(3, 3).values(vec![-5.0]).build(),
        ]);
        assert_eq!(study.best_trial().map(Trial::number), Some(2));
    }

    #[test]
    fn test_best_trial_maximize() {
        let study = Study::new(0, "s", vec![StudyDirection::Maximize])
            .with_trials(vec![complete(0, 3.0), complete(1, f64::INFINITY)]);
        assert_eq!(study.best_trial().map(Trial::number), Some(1));
    }

    #[test]
    fn test_best_trial_multi_objective_is_none() {
        let study = Study::new(
            0,
            "s",
            vec![StudyDirection::Minimize, StudyDirection::Maximize],
        );
        assert!(study.best_trial().is_none());
    }

    #[test]
    fn test_summary() {
        let study = Study::new(0, "s", vec![StudyDirection::Minimize])
            .with_trials(vec![complete(0, 1.0), complete(1, 2.0)]);
        let summary = study.summary();
        assert_eq!(summary.name, "s");
        assert_eq!(summary.trial_count, 2);
        assert!(!summary.is_preferential);
    }
}
