//! Study Schema - reconstructed optimization state
//!
//! This module provides the data structures a journal replays into.
//!
//! ## Schema Overview
//!
//! ```text
//! Study (1) ──< Trial (N)
//!                 │
//!                 ├──< TrialParam (N) ── Distribution
//!                 └──  intermediate values [step-ordered]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use trueno_journal::study::{Distribution, ParamValue, Trial, TrialParam, TrialState};
//!
//! let lr = Distribution::Float { low: 1e-5, high: 1e-1, step: None, log: true };
//! let trial = Trial::builder(0, 0)
//!     .state(TrialState::Complete)
//!     .values(vec![0.25])
//!     .param(TrialParam::new("lr", ParamValue::Float(1e-3), 1e-3, lr))
//!     .build();
//!
//! assert_eq!(trial.param("lr"), Some(&ParamValue::Float(1e-3)));
//! assert_eq!(trial.value(), Some(0.25));
//! ```

mod distribution;
mod preferential;
mod search_space;
mod study_record;
mod trial_record;

pub use distribution::{Distribution, DistributionError, ParamValue};
pub use preferential::{COMPARISON_READY_KEY, PREFERENCE_VALUES_PREFIX, PREFERENTIAL_STUDY_KEY};
pub use search_space::{intersection_search_space, union_search_space, SearchSpaceEntry};
pub use study_record::{Study, StudyDirection, StudySummary};
pub use trial_record::{Trial, TrialBuilder, TrialParam, TrialState};

/// Study system attribute holding objective names
pub const METRIC_NAMES_KEY: &str = "study:metric_names";
/// Trial system attribute holding constraint values
pub const CONSTRAINTS_KEY: &str = "constraints";
