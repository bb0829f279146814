//! Shared fixtures for integration tests
//!
//! Writes a small but complete artifact directory (models, encoders, datasets) into a
//! temporary directory laid out the way the engine expects.

#![allow(dead_code)]

use complaint_intel::ml::{EngineConfig, InferenceEngine};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const ABSENTEE_TEXT: &str = "I was marked absent but I attended class";

pub const SLA_FEATURES: [&str; 5] = [
    "Complaint Type_Absentee Error",
    "Complaint Type_Incorrect Calculation",
    "Complaint Type_Marks Mismatch",
    "Complaint Type_Missing Grade",
    "Faculty Department_Electrical Engineering",
];

pub const HAZARD_RATIOS: [f64; 5] = [1.2, 0.8, 0.5, 0.9, 0.4];

pub const RESOLVED_CSV: &str = "\
Complaint Text,Complaint Type,Resolution Description,Complaint Resolution Time
I was marked absent even though I attended the lecture,Absentee Error,Attendance corrected after checking the register,3
My marks in the portal do not match the answer sheet,Marks Mismatch,Marks updated after re-evaluation,5
Grade missing for the lab course,Missing Grade,Grade uploaded by the instructor,
";

pub const COMPLAINTS_CSV: &str = "\
Complaint Text,Complaint Type,Faculty Department,Course Code,Semester
Marked absent for the quiz day,Absentee Error,Electrical Engineering,EE201,3
Total marks calculated wrong,Calculation Discrepancy,Computer Science,CS101,1
Grade not shown for project,Missing Grade,,CS305,5
";

/// Temporary artifact directory
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    /// Directory without any artifacts
    pub fn empty() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("data")).unwrap();
        Self { dir }
    }

    /// Directory with every artifact present
    pub fn full() -> Self {
        let fixture = Self::empty();
        fixture.write_classification_models();
        fixture.write_embedding_model();
        fixture.write_sla_model();
        fixture.write_anomaly_model();
        fixture.write_datasets();
        fixture
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig::rooted_at(self.root())
    }

    /// Engine with every artifact load attempted
    pub fn engine(&self) -> InferenceEngine {
        let engine = InferenceEngine::new(self.config());
        engine.load();
        engine
    }

    pub fn write_json(&self, relative: &str, value: &serde_json::Value) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
    }

    pub fn write_text(&self, relative: &str, contents: &str) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    pub fn write_classification_models(&self) {
        // Columns: absent attended calculation grade marks mismatch missing total
        let vocabulary = [
            "absent",
            "attended",
            "calculation",
            "grade",
            "marks",
            "mismatch",
            "missing",
            "total",
        ];
        let vocabulary: serde_json::Map<String, serde_json::Value> = vocabulary
            .iter()
            .enumerate()
            .map(|(idx, term)| (term.to_string(), json!(idx)))
            .collect();

        self.write_json(
            "vectorizer.json",
            &json!({
                "vocabulary": vocabulary,
                "idf": [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
                "ngram_range": [1, 1],
                "sublinear_tf": false,
                "norm": "l2"
            }),
        );

        self.write_json(
            "classifier.json",
            &json!({
                "model_type": "logistic_regression",
                "multi_class": "multinomial",
                "classes": [0, 1, 2, 3],
                "coef": [
                    [0.0, 0.0, 0.1, 0.0, 2.5, 2.0, 0.0, 0.2],
                    [3.0, 1.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                    [0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 2.5, 0.0],
                    [0.0, 0.0, 2.5, 0.0, 0.3, 0.0, 0.0, 2.0]
                ],
                "intercept": [0.0, 0.0, 0.0, 0.0]
            }),
        );

        self.write_json(
            "label_encoder.json",
            &json!({
                "classes": [
                    "Marks Mismatch",
                    "Absentee Error",
                    "Missing Grade",
                    "Calculation Discrepancy"
                ]
            }),
        );
    }

    pub fn write_embedding_model(&self) {
        self.write_json(
            "sbert_duplicate_model/config.json",
            &json!({ "dimension": 3, "normalize": true }),
        );
        self.write_json(
            "sbert_duplicate_model/vectors.json",
            &json!({
                "marked": [0.0, 1.0, 0.0],
                "absent": [0.0, 1.0, 0.0],
                "attended": [0.0, 1.0, 0.2],
                "class": [0.0, 0.8, 0.2],
                "lecture": [0.0, 0.7, 0.3],
                "marks": [1.0, 0.0, 0.0],
                "mismatch": [1.0, 0.0, 0.0],
                "answer": [0.9, 0.0, 0.1],
                "grade": [0.0, 0.0, 1.0],
                "missing": [0.0, 0.0, 1.0],
                "calculation": [0.5, 0.0, 0.5],
                "total": [0.6, 0.0, 0.4]
            }),
        );
    }

    pub fn write_sla_model(&self) {
        self.write_json(
            "sla_survival_model.json",
            &json!({
                "model_type": "cox_ph",
                "hazard_ratios": HAZARD_RATIOS
            }),
        );
        self.write_json("sla_features.json", &json!(SLA_FEATURES));
    }

    pub fn write_anomaly_model(&self) {
        self.write_json(
            "anomaly_model.json",
            &json!({
                "max_samples": 64,
                "offset": -0.5,
                "n_features": 3,
                "trees": [
                    {"nodes": [
                        {"feature": 0, "threshold": 30.0, "left": 1, "right": 2},
                        {"n_node_samples": 62},
                        {"n_node_samples": 1}
                    ]},
                    {"nodes": [
                        {"feature": 0, "threshold": 25.0, "left": 1, "right": 2},
                        {"n_node_samples": 60},
                        {"n_node_samples": 2}
                    ]}
                ]
            }),
        );
        self.write_json(
            "le_student_program.json",
            &json!({ "classes": ["B.Tech", "M.Tech"] }),
        );
        self.write_json(
            "le_faculty_department.json",
            &json!({ "classes": ["Computer Science", "Electrical Engineering"] }),
        );
    }

    pub fn write_datasets(&self) {
        self.write_text("data/resolved_complaints.csv", RESOLVED_CSV);
        self.write_text("data/complaints.csv", COMPLAINTS_CSV);
    }

    pub fn cache_metadata(&self) -> serde_json::Value {
        let bytes = fs::read(self.path("cache/cache_metadata.json")).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}

/// Value of a sample line in Prometheus text output whose name and labels all match
pub fn metric_value(output: &str, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
    output
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter(|line| {
            line.split(|c| c == '{' || c == ' ')
                .next()
                .is_some_and(|metric| metric == name)
        })
        .find(|line| {
            labels
                .iter()
                .all(|(key, value)| line.contains(&format!("{}=\"{}\"", key, value)))
        })
        .and_then(|line| line.split_whitespace().last()?.parse().ok())
}
