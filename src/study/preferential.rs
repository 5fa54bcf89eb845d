//! Preferential studies - human pairwise comparisons instead of objective values

use serde_json::Value;

use super::{Study, Trial, TrialState};

/// Study system attribute marking a preferential study
pub const PREFERENTIAL_STUDY_KEY: &str = "preference:is_preferential";
/// Prefix of study system attributes holding reported preferences
pub const PREFERENCE_VALUES_PREFIX: &str = "preference:values";
/// Trial system attribute marking a trial ready for comparison
pub const COMPARISON_READY_KEY: &str = "preference:comparison_ready";

impl Study {
    /// Whether the study was created for preferential optimization.
    #[must_use]
    pub fn is_preferential(&self) -> bool {
        self.system_attrs().get(PREFERENTIAL_STUDY_KEY) == Some(&Value::Bool(true))
    }

    /// Reported `(better, worse)` trial-number pairs.
    ///
    /// Each report is stored under its own `preference:values*` key; pairs
    /// are returned in key order. Malformed pairs are skipped.
    #[must_use]
    pub fn preferences(&self) -> Vec<(usize, usize)> {
        self.system_attrs()
            .range(PREFERENCE_VALUES_PREFIX.to_string()..)
            .take_while(|(key, _)| key.starts_with(PREFERENCE_VALUES_PREFIX))
            .filter_map(|(_, value)| value.as_array())
            .flatten()
            .filter_map(preference_pair)
            .collect()
    }

    /// Trials ready for comparison that no reported preference ranks below
    /// another trial.
    #[must_use]
    pub fn preferential_best_trials(&self) -> Vec<&Trial> {
        let worse: Vec<usize> = self.preferences().into_iter().map(|(_, w)| w).collect();
        self.trials()
            .iter()
            .filter(|t| matches!(t.state(), TrialState::Complete | TrialState::Running))
            .filter(|t| t.system_attrs().get(COMPARISON_READY_KEY) == Some(&Value::Bool(true)))
            .filter(|t| !worse.contains(&t.number()))
            .collect()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn preference_pair(value: &Value) -> Option<(usize, usize)> {
    match value.as_array()?.as_slice() {
        [better, worse] => Some((better.as_u64()? as usize, worse.as_u64()? as usize)),
        _ => None,
    }
}
