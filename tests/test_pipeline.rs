//! Integration tests for the churn pipeline: discovery, alignment, scoring,
//! thresholding and importance ranking

use kolosal_churn::artifacts::{discover, SchemaSource};
use kolosal_churn::config::{DashboardConfig, PermutationConfig};
use kolosal_churn::dashboard::{DashboardSession, PermutationOutcome, Selection};
use kolosal_churn::error::KolosalError;
use kolosal_churn::explainability::{builtin_importance, Scoring};
use kolosal_churn::inference::{classify, score, LoadedModel};
use kolosal_churn::models::{
    sigmoid, LinearRegression, LinearSvc, LogisticRegression, ModelArtifact, Pipeline,
    ScoringCapability, StandardScaler,
};
use kolosal_churn::preprocessing::align;
use ndarray::array;
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Fixtures
// ============================================================================

const LABELLED_CSV: &str = "CustomerID,Recency,Frequency,Monetary,is_churned\n\
    1,90,1,20,1\n\
    2,5,12,900,0\n\
    3,60,2,80,1\n\
    4,10,8,450,0\n\
    5,75,1,15,1\n\
    6,3,15,1200,0\n";

const UNLABELLED_CSV: &str = "CustomerID,Recency,Frequency,Monetary\n\
    1,90,1,20\n\
    2,5,12,900\n\
    3,60,2,80\n";

struct Workspace {
    _dir: TempDir,
    data: PathBuf,
    models: PathBuf,
}

impl Workspace {
    fn new(csv: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let models = dir.path().join("models");
        fs::create_dir(&models).unwrap();
        let data = dir.path().join("customers.csv");
        fs::write(&data, csv).unwrap();
        Self { _dir: dir, data, models }
    }

    fn add_model(&self, name: &str, artifact: ModelArtifact, schema: Option<&[&str]>) {
        fs::write(
            self.models.join(format!("{}.model", name)),
            serde_json::to_string(&artifact).unwrap(),
        )
        .unwrap();
        if let Some(features) = schema {
            fs::write(
                self.models.join(format!("{}.features.json", name)),
                serde_json::to_string(features).unwrap(),
            )
            .unwrap();
        }
    }

    fn config(&self) -> DashboardConfig {
        DashboardConfig::new()
            .with_data_path(&self.data)
            .with_models_dir(&self.models)
            .with_hidden_prefixes(["best_"])
    }

    fn session(&self) -> DashboardSession {
        DashboardSession::new(self.config()).unwrap()
    }
}

fn logreg() -> ModelArtifact {
    ModelArtifact::LogisticRegression(LogisticRegression::new(vec![0.04, -0.3, -0.001], -0.5))
}

const FEATURES: [&str; 3] = ["Recency", "Frequency", "Monetary"];

fn touch(path: &Path) {
    fs::write(path, "{}").unwrap();
}

// ============================================================================
// Alignment
// ============================================================================

#[test]
fn test_missing_feature_is_zero_filled() {
    let df = df!(
        "CustomerID" => &[1i64, 2, 3],
        "Recency" => &[10.0, 20.0, 30.0],
        "Monetary" => &[5.0, 6.0, 7.0]
    )
    .unwrap();
    let schema: Vec<String> = FEATURES.iter().map(|s| s.to_string()).collect();

    let aligned = align(&df, &schema);

    assert_eq!(aligned.columns(), schema.as_slice());
    assert_eq!(aligned.ncols(), 3);
    assert_eq!(aligned.nrows(), 3);
    assert_eq!(aligned.column("Frequency"), Some(vec![0.0, 0.0, 0.0]));
    assert_eq!(aligned.column("Recency"), Some(vec![10.0, 20.0, 30.0]));
    assert_eq!(aligned.report().missing, vec!["Frequency".to_string()]);
    assert_eq!(aligned.report().dropped, vec!["CustomerID".to_string()]);
}

#[test]
fn test_alignment_is_deterministic_and_order_follows_schema() {
    let df = df!(
        "Monetary" => &[5.0, 6.0],
        "Extra" => &[1.0, 1.0],
        "Recency" => &[10.0, 20.0]
    )
    .unwrap();
    let schema = vec!["Recency".to_string(), "Monetary".to_string()];

    let a = align(&df, &schema);
    let b = align(&df, &schema);

    assert_eq!(a.values(), b.values());
    assert_eq!(a.values(), &array![[10.0, 5.0], [20.0, 6.0]]);
}

// ============================================================================
// Thresholding and scoring
// ============================================================================

#[test]
fn test_threshold_boundary_is_inclusive() {
    let labels = classify(&array![0.4, 0.5, 0.6], 0.5).unwrap();
    assert_eq!(labels.to_vec(), vec![0, 1, 1]);
}

#[test]
fn test_threshold_is_monotonic() {
    let probs = array![0.05, 0.2, 0.35, 0.5, 0.65, 0.8, 0.95];
    let mut previous = usize::MAX;
    for t in [0.0, 0.1, 0.3, 0.5, 0.7, 0.9, 1.0] {
        let churners = classify(&probs, t).unwrap().iter().filter(|&&l| l == 1).count();
        assert!(churners <= previous);
        previous = churners;
    }
}

#[test]
fn test_out_of_range_threshold_is_rejected() {
    assert!(matches!(
        classify(&array![0.5], 1.2),
        Err(KolosalError::InvalidParameter { .. })
    ));
}

#[test]
fn test_decision_scorer_falls_back_to_logistic() {
    let svc = LinearSvc::new(vec![vec![0.5, -1.0]], vec![0.25]);
    let model = LoadedModel::new("svc.model", ModelArtifact::LinearSvc(svc));
    assert_eq!(model.capability(), ScoringCapability::DecisionScorer);

    let x = array![[2.0, 1.0], [0.0, 3.0]];
    let aligned = kolosal_churn::preprocessing::AlignedMatrix::from_parts(
        vec!["a".to_string(), "b".to_string()],
        x,
    );
    let probs = score(&model, &aligned).unwrap();

    // 0.5*2 - 1 + 0.25 = 0.25 ; 0 - 3 + 0.25 = -2.75
    assert!((probs[0] - sigmoid(0.25)).abs() < 1e-12);
    assert!((probs[1] - sigmoid(-2.75)).abs() < 1e-12);
    assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
}

// ============================================================================
// Discovery
// ============================================================================

#[test]
fn test_hidden_prefix_excludes_artifacts() {
    let ws = Workspace::new(LABELLED_CSV);
    touch(&ws.models.join("best_churn_model.model"));
    touch(&ws.models.join("RandomForest.model"));
    touch(&ws.models.join("notes.txt"));

    let entries = discover(&ws.models, &["best_"]).unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["RandomForest"]);
}

#[test]
fn test_hidden_prefix_is_case_insensitive() {
    let ws = Workspace::new(LABELLED_CSV);
    touch(&ws.models.join("BEST_Model.model"));
    touch(&ws.models.join("LogReg.model"));

    let entries = discover(&ws.models, &["best_"]).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "LogReg");
}

#[test]
fn test_only_hidden_artifacts_is_no_artifacts() {
    let ws = Workspace::new(LABELLED_CSV);
    ws.add_model("best_churn_model", logreg(), Some(&FEATURES));

    let err = ws.session().run(&Selection::new()).unwrap_err();
    assert!(matches!(err, KolosalError::NoArtifacts { .. }));
}

// ============================================================================
// Dashboard pass
// ============================================================================

#[test]
fn test_full_pass_with_missing_column() {
    let ws = Workspace::new(UNLABELLED_CSV);
    let model = LogisticRegression::new(vec![0.04, -0.3, -0.001, -0.01], -0.5);
    ws.add_model(
        "LogReg",
        ModelArtifact::LogisticRegression(model),
        Some(&["Recency", "Frequency", "Monetary", "Tenure"]),
    );

    let report = ws.session().run(&Selection::new()).unwrap();

    assert_eq!(report.alignment.missing, vec!["Tenure".to_string()]);
    assert_eq!(report.summary.total_customers, 3);
    assert_eq!(report.predictions.height(), 3);
    assert!(report.predictions.column("churn_probability").is_ok());
    assert!(report.predictions.column("predicted_churn").is_ok());
    // Highest recency, lowest frequency churns most
    assert_eq!(report.top_churners[0].customer_id.as_deref(), Some("1"));
}

#[test]
fn test_unsupported_model_is_rejected() {
    let ws = Workspace::new(LABELLED_CSV);
    ws.add_model(
        "LinReg",
        ModelArtifact::LinearRegression(LinearRegression::new(vec![0.1, 0.2, 0.3], 0.0)),
        Some(&FEATURES),
    );

    let err = ws.session().run(&Selection::new()).unwrap_err();
    assert!(matches!(err, KolosalError::UnsupportedModel { .. }));
}

#[test]
fn test_missing_schema_names_both_candidates() {
    let ws = Workspace::new(LABELLED_CSV);
    ws.add_model("LogReg", logreg(), None);

    let err = ws.session().run(&Selection::new()).unwrap_err();
    match err {
        KolosalError::MissingSchema { per_model, directory, .. } => {
            assert!(per_model.ends_with("LogReg.features.json"));
            assert!(directory.ends_with("model_features.json"));
        }
        other => panic!("expected MissingSchema, got {other:?}"),
    }
}

#[test]
fn test_directory_schema_fallback() {
    let ws = Workspace::new(LABELLED_CSV);
    ws.add_model("LogReg", logreg(), None);
    fs::write(ws.models.join("model_features.json"), r#"["Recency","Frequency","Monetary"]"#).unwrap();

    let report = ws.session().run(&Selection::new()).unwrap();
    assert!(matches!(report.schema_source, SchemaSource::Directory(_)));
    assert_eq!(report.features.len(), 3);
}

#[test]
fn test_corrupt_artifact_is_load_failure() {
    let ws = Workspace::new(LABELLED_CSV);
    fs::write(ws.models.join("Broken.model"), "not json").unwrap();
    fs::write(ws.models.join("Broken.features.json"), r#"["Recency"]"#).unwrap();

    let err = ws.session().run(&Selection::new()).unwrap_err();
    assert!(matches!(err, KolosalError::ArtifactLoadFailure { .. }));
}

#[test]
fn test_missing_data_file() {
    let ws = Workspace::new(LABELLED_CSV);
    ws.add_model("LogReg", logreg(), Some(&FEATURES));
    let config = ws.config().with_data_path(ws.models.join("nope.csv"));

    let err = DashboardSession::new(config).unwrap().run(&Selection::new()).unwrap_err();
    assert!(matches!(err, KolosalError::MissingData { .. }));
}

#[test]
fn test_late_float_and_junk_cells_still_score() {
    let mut csv = String::from("CustomerID,Recency,Frequency\n");
    for i in 0..1500 {
        csv.push_str(&format!("{},{},{}\n", i, i % 90, i % 12));
    }
    csv.push_str("9999,12.5,n/a\n");

    let ws = Workspace::new(&csv);
    ws.add_model(
        "LogReg",
        ModelArtifact::LogisticRegression(LogisticRegression::new(vec![0.04, -0.3], -0.5)),
        Some(&["Recency", "Frequency"]),
    );

    let report = ws.session().run(&Selection::new()).unwrap();
    assert_eq!(report.predictions.height(), 1501);
    assert!(report.alignment.coerced_cells >= 1);
}

#[test]
fn test_empty_schema_file_is_missing_schema() {
    let ws = Workspace::new(LABELLED_CSV);
    ws.add_model("LogReg", logreg(), Some(&[]));

    let err = ws.session().run(&Selection::new()).unwrap_err();
    assert!(matches!(err, KolosalError::MissingSchema { .. }));
}

#[test]
fn test_model_selection_by_name() {
    let ws = Workspace::new(LABELLED_CSV);
    ws.add_model("A_LogReg", logreg(), Some(&FEATURES));
    ws.add_model(
        "B_Svc",
        ModelArtifact::LinearSvc(LinearSvc::new(vec![vec![0.02, -0.2, 0.0]], vec![0.0])),
        Some(&FEATURES),
    );

    let session = ws.session();
    assert_eq!(session.run(&Selection::new()).unwrap().model_name, "A_LogReg");

    let report = session.run(&Selection::new().with_model("B_Svc")).unwrap();
    assert_eq!(report.model_name, "B_Svc");
    assert_eq!(report.capability, ScoringCapability::DecisionScorer);
    // Linear SVC exposes coefficients
    assert_eq!(report.builtin_importance.len(), 3);
}

// ============================================================================
// Importance
// ============================================================================

#[test]
fn test_permutation_without_labels_is_unavailable() {
    let ws = Workspace::new(UNLABELLED_CSV);
    ws.add_model("LogReg", logreg(), Some(&FEATURES));

    let selection = Selection::new().with_permutation(PermutationConfig {
        enabled: true,
        ..PermutationConfig::default()
    });
    let report = ws.session().run(&selection).unwrap();

    assert!(matches!(report.permutation, PermutationOutcome::Unavailable { .. }));
    assert_eq!(report.predictions.height(), 3);
}

#[test]
fn test_permutation_ranks_every_feature_once() {
    let ws = Workspace::new(LABELLED_CSV);
    ws.add_model("LogReg", logreg(), Some(&FEATURES));

    let selection = Selection::new().with_permutation(PermutationConfig {
        enabled: true,
        repeats: 5,
        scoring: Scoring::Accuracy,
        ..PermutationConfig::default()
    });
    let report = ws.session().run(&selection).unwrap();

    match report.permutation {
        PermutationOutcome::Computed { ranking, repeats, .. } => {
            assert_eq!(repeats, 5);
            assert_eq!(ranking.len(), FEATURES.len());
            let mut names: Vec<&str> = ranking.entries.iter().map(|e| e.feature.as_str()).collect();
            names.sort();
            assert_eq!(names, vec!["Frequency", "Monetary", "Recency"]);
            assert!(ranking
                .entries
                .windows(2)
                .all(|w| w[0].importance >= w[1].importance));
        }
        other => panic!("expected computed ranking, got {other:?}"),
    }
}

#[test]
fn test_permutation_is_reproducible_with_seed() {
    let ws = Workspace::new(LABELLED_CSV);
    ws.add_model("LogReg", logreg(), Some(&FEATURES));
    let session = ws.session();
    let selection = Selection::new().with_permutation(PermutationConfig {
        enabled: true,
        repeats: 3,
        scoring: Scoring::RocAuc,
        ..PermutationConfig::default()
    });

    let a = session.run(&selection).unwrap().permutation;
    let b = session.run(&selection).unwrap().permutation;
    assert_eq!(a, b);
}

#[test]
fn test_pipeline_importance_uses_inner_model() {
    let inner = ModelArtifact::LogisticRegression(LogisticRegression::new(vec![0.2, -1.5], 0.0));
    let scaler = StandardScaler {
        mean: vec![50.0, 5.0],
        scale: vec![30.0, 4.0],
    };
    let pipeline = ModelArtifact::Pipeline(Pipeline::scaled(scaler, inner));
    let features = vec!["Recency".to_string(), "Frequency".to_string()];

    let ranking = builtin_importance(pipeline.as_estimator(), &features).unwrap();

    assert_eq!(ranking.len(), 2);
    assert_eq!(ranking.entries[0].feature, "Frequency");
    assert!((ranking.entries[0].importance - 1.5).abs() < 1e-12);
}

#[test]
fn test_model_without_importances_gives_empty_ranking() {
    let ws = Workspace::new(LABELLED_CSV);
    let mlp: ModelArtifact = serde_json::from_str(
        r#"{"kind":"mlp_classifier","activation":"relu","layers":[
            {"weights":[[0.1],[0.2],[0.0]],"biases":[0.0]}
        ]}"#,
    )
    .unwrap();
    ws.add_model("Mlp", mlp, Some(&FEATURES));

    let report = ws.session().run(&Selection::new()).unwrap();
    assert!(report.builtin_importance.is_empty());
    assert_eq!(report.capability, ScoringCapability::ProbabilityScorer);
}
