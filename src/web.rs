//! HTTP surface: the form page, a JSON prediction API and health checks.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ccml_io::{
    Industry, Kpi, KpiOutOfRange, KpiRanges, KpiValues, MaturityLevel, Observation,
    ParseCategoryError, SurveyResult, Vocabulary,
};
use ccml_model::{ClassProbability, ErrorKind, ModelError};
use serde::Serialize;
use tracing::{info, warn};

use crate::context::AppContext;
use crate::page::{self, PageOutcome};

/// A form field the page could not accept.
#[derive(Debug, thiserror::Error)]
pub(crate) enum FormError {
    /// The text of a KPI field is not a finite number.
    #[error("{label}: \"{raw}\" is not a number")]
    InvalidNumber {
        /// KPI display label.
        label: &'static str,
        /// Submitted text.
        raw: String,
    },
    /// A KPI value lies outside the training range.
    #[error(transparent)]
    OutOfRange(#[from] KpiOutOfRange),
    /// A dropdown value is outside its vocabulary.
    #[error(transparent)]
    UnknownCategory(#[from] ParseCategoryError),
}

/// Form values as shown back to the user, plus anything refused.
struct FormInput {
    observation: Observation,
    problems: Vec<FormError>,
}

/// Read query parameters into an observation.
///
/// Absent KPI fields take the column mean and absent dropdowns their first
/// member. Refused values are recorded and shown pinned to the range, so the
/// controls stay usable, but the submission is never predicted.
fn read_form(ranges: &KpiRanges, params: &HashMap<String, String>) -> FormInput {
    let mut problems = Vec::new();
    let means = ranges.means();
    let kpis = KpiValues::from_fn(|kpi| {
        let Some(raw) = params.get(kpi.field()) else {
            return means.get(kpi);
        };
        match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => match ranges.check_one(kpi, value) {
                Ok(()) => value,
                Err(err) => {
                    problems.push(err.into());
                    ranges.clamp(kpi, value)
                }
            },
            _ => {
                problems.push(FormError::InvalidNumber {
                    label: kpi.label(),
                    raw: raw.clone(),
                });
                means.get(kpi)
            }
        }
    });

    let survey_result = read_choice::<SurveyResult>(params, "survey_result", &mut problems);
    let industry = read_choice::<Industry>(params, "industry", &mut problems);

    FormInput {
        observation: Observation {
            kpis,
            survey_result,
            industry,
        },
        problems,
    }
}

fn read_choice<V: Vocabulary>(
    params: &HashMap<String, String>,
    name: &str,
    problems: &mut Vec<FormError>,
) -> V {
    let fallback = V::ALL[0];
    match params.get(name).map(|raw| V::parse_label(raw)) {
        None => fallback,
        Some(Ok(value)) => value,
        Some(Err(err)) => {
            problems.push(err.into());
            fallback
        }
    }
}

/// HTTP status for a failed prediction.
fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Data | ErrorKind::Model | ErrorKind::Schema => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn kind_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Data => "data_error",
        ErrorKind::Model => "model_error",
        ErrorKind::Schema => "schema_error",
        ErrorKind::Storage => "storage_error",
    }
}

/// API error response body.
#[derive(Debug, Serialize)]
struct ApiError {
    error: ApiErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: &'static str,
}

/// Build a JSON error response.
fn api_error(status: StatusCode, error_type: &'static str, message: String) -> Response {
    let body = ApiError {
        error: ApiErrorDetail {
            message,
            error_type,
        },
    };
    (status, Json(body)).into_response()
}

fn model_error(err: &ModelError) -> Response {
    let kind = err.kind();
    warn!(error = %err, kind = kind_name(kind), "prediction failed");
    api_error(status_for(kind), kind_name(kind), err.to_string())
}

/// `GET /`: the form page. Any query parameters are treated as a submission.
async fn index(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let input = read_form(ctx.bundle().kpi_ranges(), &params);
    if !input.problems.is_empty() {
        let messages: Vec<String> = input.problems.iter().map(ToString::to_string).collect();
        warn!(n_problems = messages.len(), "form submission rejected");
        let html = page::render(&ctx, &input.observation, &PageOutcome::Rejected(&messages));
        return (StatusCode::UNPROCESSABLE_ENTITY, Html(html)).into_response();
    }

    match ctx.bundle().predict_observation(&input.observation) {
        Ok(prediction) => Html(page::render(
            &ctx,
            &input.observation,
            &PageOutcome::Predicted(&prediction),
        ))
        .into_response(),
        Err(err) => {
            let messages = vec![err.to_string()];
            let html = page::render(&ctx, &input.observation, &PageOutcome::Rejected(&messages));
            (status_for(err.kind()), Html(html)).into_response()
        }
    }
}

/// Body of a successful `POST /api/predict`.
#[derive(Debug, Serialize)]
struct PredictResponse {
    label: MaturityLevel,
    probabilities: Vec<ClassProbability>,
    accuracy: f64,
}

/// `POST /api/predict`: classify one JSON observation.
async fn predict(
    State(ctx): State<Arc<AppContext>>,
    Json(observation): Json<Observation>,
) -> Response {
    let bundle = ctx.bundle();
    if let Err(err) = bundle.kpi_ranges().check(&observation.kpis) {
        return api_error(StatusCode::UNPROCESSABLE_ENTITY, "out_of_range", err.to_string());
    }
    match bundle.predict_observation(&observation) {
        Ok(prediction) => Json(PredictResponse {
            label: prediction.label,
            probabilities: prediction.probabilities,
            accuracy: bundle.accuracy(),
        })
        .into_response(),
        Err(err) => model_error(&err),
    }
}

/// One KPI as described by `GET /api/model`.
#[derive(Debug, Serialize)]
struct KpiSummary {
    field: &'static str,
    column: &'static str,
    label: &'static str,
    min: f64,
    max: f64,
    mean: f64,
}

/// Body of `GET /api/model`.
#[derive(Debug, Serialize)]
struct ModelSummary {
    key: String,
    classes: Vec<MaturityLevel>,
    accuracy: f64,
    n_trees: usize,
    feature_names: Vec<String>,
    kpis: Vec<KpiSummary>,
    survey_results: Vec<&'static str>,
    industries: Vec<&'static str>,
}

/// `GET /api/model`: classes, accuracy, and input bounds.
async fn model_summary(State(ctx): State<Arc<AppContext>>) -> Json<ModelSummary> {
    let bundle = ctx.bundle();
    let ranges = bundle.kpi_ranges();
    Json(ModelSummary {
        key: ctx.key().to_string(),
        classes: bundle.classes().to_vec(),
        accuracy: bundle.accuracy(),
        n_trees: bundle.forest().n_trees(),
        feature_names: bundle.preprocessor().feature_names(),
        kpis: Kpi::ALL
            .iter()
            .map(|&kpi| {
                let range = ranges.get(kpi);
                KpiSummary {
                    field: kpi.field(),
                    column: kpi.column(),
                    label: kpi.label(),
                    min: range.min,
                    max: range.max,
                    mean: range.mean,
                }
            })
            .collect(),
        survey_results: SurveyResult::ALL.iter().map(|v| v.label()).collect(),
        industries: Industry::ALL.iter().map(|v| v.label()).collect(),
    })
}

/// `GET /health`.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Build the axum [`Router`] with all routes.
pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/predict", post(predict))
        .route("/api/model", get(model_summary))
        .route("/health", get(health))
        .with_state(ctx)
}

/// Resolve when Ctrl-C is received.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Bind `listen` and serve until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(ctx: Arc<AppContext>, listen: SocketAddr) -> std::io::Result<()> {
    let app = build_router(Arc::clone(&ctx));
    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!(
        addr = %listener.local_addr()?,
        bundle = %ctx.bundle_path().display(),
        "serving maturity predictions"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::OnceLock;

    use axum::body::Body;
    use axum::http::Request;
    use ccml_io::{ModelKey, TrainingReader};
    use ccml_model::{ModelBundle, TrainingConfig};
    use tower::ServiceExt;

    use super::*;

    fn bundle() -> &'static ModelBundle {
        static BUNDLE: OnceLock<ModelBundle> = OnceLock::new();
        BUNDLE.get_or_init(|| {
            let csv = Path::new(env!("CARGO_MANIFEST_DIR"))
                .join("crates/ccml-model/tests/fixtures/call_center.csv");
            let table = TrainingReader::new(&csv).read().unwrap();
            TrainingConfig::new()
                .with_n_trees(20)
                .fit(&table)
                .unwrap()
                .bundle
        })
    }

    /// Build a test router around the fixture bundle.
    fn test_app() -> Router {
        let ctx = AppContext::from_bundle(
            ModelKey::default(),
            bundle().clone(),
            Path::new("maturity_model.bundle"),
        );
        build_router(Arc::new(ctx))
    }

    async fn send(req: Request<Body>) -> (StatusCode, String) {
        let response = test_app().oneshot(req).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    async fn get_uri(uri: &str) -> (StatusCode, String) {
        send(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    async fn post_json(body: String) -> (StatusCode, String) {
        send(
            Request::builder()
                .method("POST")
                .uri("/api/predict")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    fn mean_observation() -> Observation {
        Observation {
            kpis: bundle().kpi_ranges().means(),
            survey_result: SurveyResult::Satisfied,
            industry: Industry::Banking,
        }
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (status, body) = get_uri("/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn index_renders_default_prediction() {
        let (status, body) = get_uri("/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Predicted Maturity Level:"));
        assert!(body.contains("<svg"));
        assert_eq!(body.matches("type=\"range\"").count(), 9);
        assert!(body.contains(&page::format_accuracy(bundle().accuracy())));
    }

    #[tokio::test]
    async fn index_accepts_full_submission() {
        let ranges = bundle().kpi_ranges();
        let mut query: Vec<String> = Kpi::ALL
            .iter()
            .map(|&kpi| format!("{}={}", kpi.field(), ranges.get(kpi).max))
            .collect();
        query.push("survey_result=Dissatisfied".to_string());
        query.push("industry=Tech+Support".to_string());
        let (status, body) = get_uri(&format!("/?{}", query.join("&"))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<option value=\"Tech Support\" selected>"));
    }

    #[tokio::test]
    async fn out_of_range_submission_is_rejected_not_clamped() {
        let (status, body) = get_uri("/?csat_pct=1000").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.contains("Input rejected"));
        assert!(body.contains("outside the observed range"));
        assert!(!body.contains("Predicted Maturity Level:"));
    }

    #[tokio::test]
    async fn unknown_dropdown_and_text_number_rejected() {
        let (status, body) = get_uri("/?industry=Retail&fcr_pct=lots").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.contains("Retail"));
        assert!(body.contains("is not a number"));
    }

    #[tokio::test]
    async fn api_predict_returns_distribution() {
        let (status, body) = post_json(serde_json::to_string(&mean_observation()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        let probabilities = json["probabilities"].as_array().unwrap();
        assert_eq!(probabilities.len(), bundle().classes().len());
        let total: f64 = probabilities
            .iter()
            .map(|p| p["probability"].as_f64().unwrap())
            .sum();
        assert!((total - 1.0).abs() < 1e-6);
        let label = json["label"].as_str().unwrap();
        assert!(bundle().classes().iter().any(|c| c.as_str() == label));
        assert_eq!(json["accuracy"].as_f64().unwrap(), bundle().accuracy());
    }

    #[tokio::test]
    async fn api_predict_rejects_out_of_range() {
        let mut observation = mean_observation();
        observation.kpis.asa_sec = -5.0;
        let (status, body) = post_json(serde_json::to_string(&observation).unwrap()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"]["type"], "out_of_range");
    }

    #[tokio::test]
    async fn api_predict_rejects_unknown_industry() {
        let mut json = serde_json::to_value(mean_observation()).unwrap();
        json["industry"] = serde_json::Value::from("Retail");
        let (status, _) = post_json(json.to_string()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn api_model_describes_inputs() {
        let (status, body) = get_uri("/api/model").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["key"], "maturity_model");
        assert_eq!(json["classes"].as_array().unwrap().len(), 3);
        assert_eq!(json["kpis"].as_array().unwrap().len(), 9);
        assert_eq!(json["kpis"][0]["column"], "AHT (min)");
        assert_eq!(json["industries"][4], "Tech Support");
    }

    #[test]
    fn status_mapping_follows_error_kind() {
        assert_eq!(status_for(ErrorKind::Schema), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(ErrorKind::Storage), StatusCode::INTERNAL_SERVER_ERROR);
        let err = ModelError::SchemaMismatch {
            what: "numeric feature",
            expected: 9,
            got: 8,
        };
        assert_eq!(model_error(&err).status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
