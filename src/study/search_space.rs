//! Search space aggregation over a study's trials
//!
//! Both views are derived on demand and never stored. Output order is
//! deterministic: first-seen order across trials (union) or the first
//! trial's param order (intersection).

use serde::Serialize;

use super::{Distribution, Trial};

/// One parameter of a search space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchSpaceEntry {
    name: String,
    distribution: Distribution,
}

impl SearchSpaceEntry {
    /// Create an entry.
    #[must_use]
    pub fn new(name: impl Into<String>, distribution: Distribution) -> Self {
        Self {
            name: name.into(),
            distribution,
        }
    }

    /// Get the param name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the distribution.
    #[must_use]
    pub const fn distribution(&self) -> &Distribution {
        &self.distribution
    }
}

/// Union search space: every distinct `(name, distribution)` pair sampled by
/// at least one trial.
///
/// Identical pairs collapse to one entry. The same name sampled with
/// different distributions (e.g. different bounds) yields one entry per
/// distribution.
///
/// ```rust
/// use trueno_journal::study::{union_search_space, Distribution, ParamValue, Trial, TrialParam};
///
/// let dist = |high| Distribution::Float { low: 0.0, high, step: None, log: false };
/// let trials = vec![
///     Trial::builder(0, 0).param(TrialParam::new("x", ParamValue::Float(0.5), 0.5, dist(1.0))).build(),
///     Trial::builder(1, 1).param(TrialParam::new("x", ParamValue::Float(0.7), 0.7, dist(1.0))).build(),
///     Trial::builder(2, 2).param(TrialParam::new("x", ParamValue::Float(5.0), 5.0, dist(9.0))).build(),
/// ];
/// assert_eq!(union_search_space(&trials).len(), 2);
/// ```
#[must_use]
pub fn union_search_space(trials: &[Trial]) -> Vec<SearchSpaceEntry> {
    let mut entries: Vec<SearchSpaceEntry> = Vec::new();
    for param in trials.iter().flat_map(Trial::params) {
        let seen = entries
            .iter()
            .any(|e| e.name == param.name() && e.distribution == *param.distribution());
        if !seen {
            entries.push(SearchSpaceEntry::new(
                param.name(),
                param.distribution().clone(),
            ));
        }
    }
    entries
}

/// Intersection search space: `(name, distribution)` pairs present with an
/// identical distribution in every trial.
///
/// A study without trials has an empty intersection.
#[must_use]
pub fn intersection_search_space(trials: &[Trial]) -> Vec<SearchSpaceEntry> {
    let Some((first, rest)) = trials.split_first() else {
        return Vec::new();
    };

    first
        .params()
        .iter()
        .filter(|param| {
            rest.iter()
                .all(|trial| trial.distribution(param.name()) == Some(param.distribution()))
        })
        .map(|param| SearchSpaceEntry::new(param.name(), param.distribution().clone()))
        .collect()
}
