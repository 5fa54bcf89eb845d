//! Journal Store - queryable result of one journal parse
//!
//! This is what collaborators (the dashboard backend, the REST layer) read
//! from: study summaries, full studies with their trials, and the
//! record-level errors met along the way.

use serde::Serialize;

use super::ParseError;
use crate::study::{Study, StudySummary};

/// Owned result of a journal parse.
///
/// ## Design
///
/// Studies are kept in creation order, which is also `study_id` order, so
/// lookups by id are a binary search. Deleted studies are absent but their
/// ids are never reassigned.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JournalStore {
    studies: Vec<Study>,
    errors: Vec<ParseError>,
    created_study_count: usize,
}

impl JournalStore {
    /// Create a store from replayed studies and collected errors.
    ///
    /// # Arguments
    ///
    /// * `studies` - Live studies in creation order
    /// * `errors` - Record-level errors in journal order
    /// * `created_study_count` - Studies ever created, deleted ones included
    #[must_use]
    pub fn new(studies: Vec<Study>, errors: Vec<ParseError>, created_study_count: usize) -> Self {
        Self {
            studies,
            errors,
            created_study_count,
        }
    }

    /// Check if the store is empty (no studies and no errors).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.studies.is_empty() && self.errors.is_empty()
    }

    /// Get the number of live studies.
    #[must_use]
    pub fn study_count(&self) -> usize {
        self.studies.len()
    }

    /// Get the number of studies ever created, deleted ones included.
    #[must_use]
    pub const fn created_study_count(&self) -> usize {
        self.created_study_count
    }

    /// Get the number of trials across live studies.
    #[must_use]
    pub fn trial_count(&self) -> usize {
        self.studies.iter().map(|s| s.trials().len()).sum()
    }

    /// Get the number of record-level errors.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Summaries of live studies, in creation order.
    ///
    /// Deleted studies are not listed; [`JournalStore::created_study_count`]
    /// counts every study ever created.
    #[must_use]
    pub fn summaries(&self) -> Vec<StudySummary> {
        self.studies.iter().map(Study::summary).collect()
    }

    /// Live studies, in creation order.
    #[must_use]
    pub fn studies(&self) -> &[Study] {
        &self.studies
    }

    /// Get a study by ID.
    #[must_use]
    pub fn study(&self, study_id: usize) -> Option<&Study> {
        self.studies
            .binary_search_by_key(&study_id, Study::study_id)
            .ok()
            .map(|i| &self.studies[i])
    }

    /// Get every live study with the given name.
    ///
    /// Journals do not enforce unique names, so there may be several.
    #[must_use]
    pub fn studies_named(&self, name: &str) -> Vec<&Study> {
        self.studies.iter().filter(|s| s.name() == name).collect()
    }

    /// Record-level errors, in journal order.
    #[must_use]
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Take ownership of the studies and errors.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Study>, Vec<ParseError>) {
        (self.studies, self.errors)
    }
}
