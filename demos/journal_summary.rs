//! Journal Summary Example
//!
//! Reads an Optuna journal file and prints what a dashboard would list:
//! studies, their best trials and search spaces, and rejected records.
//!
//! Run with: cargo run --example journal_summary -- path/to/journal.log
//! (without a path, a small built-in journal is used)

use anyhow::{Context, Result};
use trueno_journal::journal::JournalReader;
use trueno_journal::JournalStore;

const SAMPLE_JOURNAL: &str = concat!(
    r#"{"op_code": 0, "worker_id": "w0", "study_name": "lr-sweep", "directions": [1]}"#, "\n",
    r#"{"op_code": 3, "worker_id": "w0", "study_id": 0, "system_attr": {"study:metric_names": ["loss"]}}"#, "\n",
    r#"{"op_code": 5, "worker_id": "w0", "study_id": 0, "datetime_start": "2024-05-01T10:00:00.000000"}"#, "\n",
    r#"{"op_code": 6, "worker_id": "w0", "trial_id": 0, "param_name": "lr", "param_value_internal": 0.01, "distribution": "{\"name\": \"FloatDistribution\", \"attributes\": {\"low\": 1e-05, \"high\": 0.1, \"step\": null, \"log\": true}}"}"#, "\n",
    r#"{"op_code": 7, "worker_id": "w0", "trial_id": 0, "state": 1, "values": [0.42], "datetime_complete": "2024-05-01T10:00:07.500000"}"#, "\n",
    r#"{"op_code": 5, "worker_id": "w1", "study_id": 0, "datetime_start": "2024-05-01T10:00:01.000000"}"#, "\n",
    r#"{"op_code": 7, "worker_id": "w1", "trial_id": 1, "state": 3, "values": null}"#, "\n",
    r#"{"op_code": 7, "worker_id": "w1", "trial_id": 1, "state": 1, "values": [NaN"#, "\n",
);

fn main() -> Result<()> {
    trueno_journal::init_tracing()?;

    println!("=== Trueno-Journal Summary ===\n");

    let reader = JournalReader::builder()
        .max_record_bytes(Some(1 << 20))
        .build()?;

    let store = match std::env::args().nth(1) {
        Some(path) => reader
            .read_path(&path)
            .with_context(|| format!("failed to read journal {path}"))?,
        None => {
            println!("(no path given, using the built-in sample journal)\n");
            reader.read(SAMPLE_JOURNAL.as_bytes())?
        }
    };

    print_studies(&store);
    print_errors(&store);

    // -------------------------------------------------------------------------
    // JSON payload as served to the dashboard
    // -------------------------------------------------------------------------
    println!("\nSummaries JSON:");
    println!("{}", serde_json::to_string_pretty(&store.summaries())?);

    println!("\n=== Summary Complete ===");
    Ok(())
}

fn print_studies(store: &JournalStore) {
    println!(
        "Studies: {} live, {} created",
        store.study_count(),
        store.created_study_count()
    );

    for study in store.studies() {
        println!("\n[{}] {}", study.study_id(), study.name());
        println!("   Directions: {:?}", study.directions());
        if let Some(names) = study.metric_names() {
            println!("   Metrics: {}", names.join(", "));
        }
        println!("   Trials: {}", study.trials().len());

        for trial in study.trials() {
            print!("     #{} {:?}", trial.number(), trial.state());
            if !trial.values().is_empty() {
                print!(" values={:?}", trial.values());
            }
            if let Some(duration) = trial.duration() {
                print!(" ({} ms)", duration.num_milliseconds());
            }
            println!();
        }

        if let Some(best) = study.best_trial() {
            println!("   Best: trial #{} = {:?}", best.number(), best.value());
        }

        let space: Vec<String> = study
            .union_search_space()
            .iter()
            .map(|e| format!("{} ({})", e.name(), e.distribution().kind_name()))
            .collect();
        if !space.is_empty() {
            println!("   Search space: {}", space.join(", "));
        }
    }
}

fn print_errors(store: &JournalStore) {
    println!("\nRejected records: {}", store.errors().len());
    for error in store.errors() {
        match error.record() {
            Some(record) => println!(
                "   record {} (byte {}): {error}",
                record.index, record.offset
            ),
            None => println!("   {error}"),
        }
    }
}
