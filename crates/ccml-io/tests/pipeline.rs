//! Integration tests: fixture CSV -> training table -> ranges -> JSON report.

use std::fs;
use std::path::Path;

use ccml_io::{
    Industry, Kpi, ModelKey, ReportWriter, SurveyResult, TrainingReader, TrainingReport,
};
use tempfile::TempDir;

/// Path to the test fixture directory.
fn fixture_path(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn fixture_loads_with_three_levels() {
    let table = TrainingReader::new(&fixture_path("call_center.csv"))
        .read()
        .expect("fixture should parse");

    assert_eq!(table.n_samples(), 90);
    let labels: Vec<String> = table.distinct_labels().iter().map(|l| l.to_string()).collect();
    assert_eq!(labels, ["High", "Low", "Medium"]);

    // Every vocabulary member occurs at least once.
    for industry in [
        Industry::Healthcare,
        Industry::Banking,
        Industry::Utilities,
        Industry::Sales,
        Industry::TechSupport,
    ] {
        assert!(table.rows().iter().any(|r| r.observation.industry == industry));
    }
    assert!(
        table
            .rows()
            .iter()
            .any(|r| r.observation.survey_result == SurveyResult::Neutral)
    );
}

#[test]
fn fixture_ranges_match_known_extremes() {
    let table = TrainingReader::new(&fixture_path("call_center.csv"))
        .read()
        .unwrap();
    let ranges = table.kpi_ranges().unwrap();

    let csat = ranges.get(Kpi::Csat);
    assert_eq!(csat.min, 51.9);
    assert_eq!(csat.max, 96.7);
    assert!(csat.mean > csat.min && csat.mean < csat.max);

    let asa = ranges.get(Kpi::Asa);
    assert_eq!(asa.min, 10.0);
    assert_eq!(asa.max, 139.0);

    for row in table.rows() {
        assert!(ranges.check(&row.observation.kpis).is_ok());
    }
}

#[test]
fn report_written_for_fixture_summary() {
    let table = TrainingReader::new(&fixture_path("call_center.csv"))
        .read()
        .unwrap();
    let ranges = table.kpi_ranges().unwrap();

    let report = TrainingReport {
        model_key: "fixture".to_string(),
        n_samples: table.n_samples(),
        n_train: 72,
        n_test: 18,
        test_fraction: 0.2,
        seed: 42,
        n_trees: 100,
        classes: table.distinct_labels().iter().map(|l| l.to_string()).collect(),
        accuracy: 1.0,
        confusion_matrix: vec![vec![6, 0, 0], vec![0, 6, 0], vec![0, 0, 6]],
        class_metrics: Vec::new(),
        importances: Vec::new(),
        kpi_ranges: Kpi::ALL
            .iter()
            .map(|&kpi| (kpi.column().to_string(), ranges.get(kpi)))
            .collect(),
    };

    let dir = TempDir::new().unwrap();
    let key = ModelKey::new("fixture".into()).unwrap();
    let writer = ReportWriter::new(dir.path(), key).unwrap();
    writer.write_training_report(&report).unwrap();

    let json_path = dir.path().join("fixture_report.json");
    let content: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(content["model_key"], "fixture");
    assert_eq!(content["n_samples"].as_u64().unwrap(), 90);
    assert_eq!(content["kpi_ranges"].as_array().unwrap().len(), 9);
    assert_eq!(content["kpi_ranges"][3][0], "CSAT (%)");
}
