//! Search Space Tests
//!
//! Union and intersection views over trials replayed from a journal.

use serde_json::json;
use trueno_journal::parse_journal;
use trueno_journal::study::{
    intersection_search_space, union_search_space, Distribution, ParamValue, Trial, TrialParam,
};

fn float(high: f64) -> Distribution {
    Distribution::Float {
        low: 0.0,
        high,
        step: None,
        log: false,
    }
}

fn param(name: &str, internal: f64, distribution: Distribution) -> TrialParam {
    TrialParam::new(name, ParamValue::Float(internal), internal, distribution)
}

fn names(entries: &[trueno_journal::study::SearchSpaceEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.name()).collect()
}

// =============================================================================
// Direct aggregation
// =============================================================================

#[test]
fn test_empty_trials() {
    assert!(union_search_space(&[]).is_empty());
    assert!(intersection_search_space(&[]).is_empty());
}

#[test]
fn test_union_keeps_first_seen_order() {
    let trials = vec![
        Trial::builder(0, 0).param(param("b", 0.1, float(1.0))).build(),
        Trial::builder(1, 1)
            .param(param("a", 0.2, float(1.0)))
            .param(param("b", 0.3, float(1.0)))
            .build(),
    ];
    assert_eq!(names(&union_search_space(&trials)), vec!["b", "a"]);
}

#[test]
fn test_union_splits_same_name_different_distribution() {
    let trials = vec![
        Trial::builder(0, 0).param(param("x", 0.1, float(1.0))).build(),
        Trial::builder(1, 1).param(param("x", 2.0, float(5.0))).build(),
    ];
    let union = union_search_space(&trials);
    assert_eq!(names(&union), vec!["x", "x"]);
    assert_eq!(union[1].distribution(), &float(5.0));
}

#[test]
fn test_intersection_requires_identical_distribution() {
    let trials = vec![
        Trial::builder(0, 0)
            .param(param("x", 0.1, float(1.0)))
            .param(param("y", 0.1, float(1.0)))
            .build(),
        Trial::builder(1, 1)
            .param(param("x", 0.9, float(1.0)))
            .param(param("y", 3.0, float(4.0)))
            .build(),
    ];
    let intersection = intersection_search_space(&trials);
    assert_eq!(names(&intersection), vec!["x"]);
}

#[test]
fn test_intersection_is_subset_of_union() {
    let trials = vec![
        Trial::builder(0, 0)
            .param(param("x", 0.1, float(1.0)))
            .param(param("z", 0.1, float(1.0)))
            .build(),
        Trial::builder(1, 1).param(param("x", 0.5, float(1.0))).build(),
    ];
    let union = union_search_space(&trials);
    let intersection = intersection_search_space(&trials);
    assert!(intersection.iter().all(|e| union.contains(e)));
    assert_eq!(names(&intersection), vec!["x"]);
}

// =============================================================================
// Through a replayed study
// =============================================================================

#[test]
fn test_study_search_spaces_from_journal() {
    let x = r#"{"name": "FloatDistribution", "attributes": {"low": 0.0, "high": 1.0, "step": null, "log": false}}"#;
    let opt = r#"{"name": "CategoricalDistribution", "attributes": {"choices": ["sgd", "adam"]}}"#;
    let records = [
        json!({"op_code": 0, "study_name": "s", "directions": [1]}),
        json!({"op_code": 5, "study_id": 0}),
        json!({"op_code": 6, "trial_id": 0, "param_name": "x", "param_value_internal": 0.5, "distribution": x}),
        json!({"op_code": 6, "trial_id": 0, "param_name": "opt", "param_value_internal": 0, "distribution": opt}),
        json!({"op_code": 5, "study_id": 0}),
        json!({"op_code": 6, "trial_id": 1, "param_name": "x", "param_value_internal": 0.1, "distribution": x}),
    ];
    let text: String = records.iter().map(|r| format!("{r}\n")).collect();
    let store = parse_journal(text.as_bytes()).unwrap();
    assert!(store.errors().is_empty());

    let study = store.study(0).unwrap();
    assert_eq!(names(&study.union_search_space()), vec!["x", "opt"]);
    assert_eq!(names(&study.intersection_search_space()), vec!["x"]);
}
