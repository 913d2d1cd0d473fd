//! End-to-end router tests against a mock text generator.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use vecta_core::{Database, VectaCore};
use vecta_llm::{AnalysisService, MockTextGenerator};
use vecta_server::{router, AppState, ServiceConfig};

const BOUNDARY: &str = "vecta-test-boundary";

const BULLET_RESPONSE: &str = "Features suggest focal epilepsy.\n\
    - Classification: Focal impaired awareness seizure\n\
    - Clinical_Confidence: High\n\
    - Evidence: Lip smacking with postictal confusion\n\
    - Medication_Analysis: Levetiracetam is appropriate first line";

const SEIZURE_NOTE: &str = "Staring spells with lip smacking and EEG changes over the left temporal lobe";

fn app_configured(
    generator: Arc<MockTextGenerator>,
    configure: impl FnOnce(&mut ServiceConfig),
) -> (TempDir, Router) {
    let dir = tempfile::tempdir().unwrap();
    let core = VectaCore::with_database(dir.path(), Database::open_in_memory().unwrap()).unwrap();
    let mut config = ServiceConfig {
        data_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    configure(&mut config);
    let service = AnalysisService::new(generator, Arc::new(core), config.service_settings());
    (dir, router(AppState::new(service, config)))
}

fn app_with(generator: MockTextGenerator, sample_rate: f64) -> (TempDir, Router) {
    app_configured(Arc::new(generator), |config| config.sample_rate = sample_rate)
}

fn app() -> (TempDir, Router) {
    app_with(
        MockTextGenerator::new(BULLET_RESPONSE).with_generated_tokens(64),
        1.0,
    )
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a [u8]),
}

fn multipart(parts: &[Part]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File(filename, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/analyze")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, value: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(value.to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn analyze_note(app: &Router) -> Value {
    let (status, body) = send(
        app,
        multipart(&[
            Part::Text("prompt", "Classify the seizure type"),
            Part::Text("analysisType", "classification"),
            Part::Text("specialty", "neurology"),
            Part::Text("directText", SEIZURE_NOTE),
            Part::Text("userId", "clinician-3"),
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
}

#[tokio::test]
async fn test_liveness() {
    let (_dir, app) = app();
    let (status, body) = send(&app, get("/test")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], "2.0-enhanced-prompting");
}

#[tokio::test]
async fn test_health() {
    let (_dir, app) = app();
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["max_concurrent"], 10);
    assert_eq!(body["queue_size"], 0);
}

#[tokio::test]
async fn test_analyze_direct_text() {
    let (_dir, app) = app();
    let body = analyze_note(&app).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["is_tabular"], false);
    assert_eq!(body["condition"], "epilepsy");
    assert!(body["content_warnings"].is_array());

    let analysis = body["analysis"].as_str().unwrap();
    assert_eq!(analysis.lines().count(), 4);
    assert!(analysis.starts_with("- Classification: Focal impaired awareness seizure"));
}

#[tokio::test]
async fn test_validation_errors_are_joined() {
    let (_dir, app) = app();
    let (status, body) = send(&app, multipart(&[Part::Text("analysisType", "custom")])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(
        body["error"],
        "Prompt is required; Either file upload or direct text input is required"
    );
}

#[tokio::test]
async fn test_csv_upload_is_tabular() {
    let (_dir, app) = app();
    let (status, body) = send(
        &app,
        multipart(&[
            Part::Text("prompt", "Classify each patient"),
            Part::Text("analysisType", "classification"),
            Part::File("cohort.csv", b"patient,symptom\np1,seizure\np2,tremor\n"),
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["is_tabular"], true);
    assert_eq!(body["tabular_output"]["shape"], json!([2, 9]));
}

#[tokio::test]
async fn test_direct_csv_reaches_model_unchanged() {
    let generator = Arc::new(MockTextGenerator::new(BULLET_RESPONSE).with_generated_tokens(64));
    let (_dir, app) = app_configured(generator.clone(), |config| config.sample_rate = 1.0);
    let csv = "patient,symptom,duration\np1,seizure,2 min\np2,tremor,months";

    let (status, body) = send(
        &app,
        multipart(&[
            Part::Text("prompt", "Classify each patient"),
            Part::Text("analysisType", "classification"),
            Part::Text("directText", csv),
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["is_tabular"], true);
    assert_eq!(
        body["tabular_output"]["columns"].as_array().unwrap()[..3],
        [json!("patient"), json!("symptom"), json!("duration")]
    );

    let prompt = &generator.prompts()[0];
    assert!(prompt.contains(csv));
    assert!(!prompt.contains("VECTA AI DATASET PROFILE"));

    let (_, next) = send(&app, get("/validate/api/next-case")).await;
    assert_eq!(next["case"]["input_text"], csv);
}

#[tokio::test]
async fn test_binary_document_rejected() {
    let (_dir, app) = app();
    let (status, body) = send(
        &app,
        multipart(&[
            Part::Text("prompt", "Summarise"),
            Part::Text("analysisType", "summary"),
            Part::File("discharge.pdf", b"%PDF-1.7"),
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains(".pdf"));
}

#[tokio::test]
async fn test_model_unreachable_is_500_with_message() {
    let (_dir, app) = app_with(MockTextGenerator::unreachable(), 1.0);
    let (status, body) = send(
        &app,
        multipart(&[
            Part::Text("prompt", "Summarise"),
            Part::Text("analysisType", "summary"),
            Part::Text("directText", "Progressive gait ataxia"),
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Vecta AI analysis failed:"));
}

#[tokio::test]
async fn test_over_capacity_request_is_503() {
    let generator = Arc::new(
        MockTextGenerator::new(BULLET_RESPONSE)
            .with_generated_tokens(64)
            .with_delay(Duration::from_millis(400)),
    );
    let (_dir, app) = app_configured(generator.clone(), |config| {
        config.max_concurrent_users = 1;
        config.enqueue_timeout_ms = 20;
    });

    let slow = {
        let app = app.clone();
        tokio::spawn(async move { analyze_note(&app).await })
    };
    tokio::time::timeout(Duration::from_secs(2), async {
        while generator.prompts().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let (status, body) = send(
        &app,
        multipart(&[
            Part::Text("prompt", "Summarise"),
            Part::Text("analysisType", "summary"),
            Part::Text("directText", "Progressive gait ataxia"),
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Vecta AI service at capacity. Try again later.");

    let first = slow.await.unwrap();
    assert_eq!(first["success"], true);
    assert_eq!(generator.prompts().len(), 1);
}

#[tokio::test]
async fn test_reviewer_registration_flow() {
    let (_dir, app) = app();

    let (status, body) = send(
        &app,
        post_json(
            "/validate/api/reviewers",
            json!({"id": "dr_okafor", "email": "okafor@example.org", "name": "Dr Okafor",
                   "specialty": "neuromuscular", "subspecialties": ["myasthenia"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["reviewer_id"], "dr_okafor");

    let (status, body) = send(
        &app,
        post_json(
            "/validate/api/reviewers",
            json!({"email": "demo@vecta.ai", "name": "Someone Else"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("demo@vecta.ai"));

    let (_, list) = send(&app, get("/validate/api/reviewers")).await;
    assert_eq!(list["reviewers"].as_array().unwrap().len(), 2);

    analyze_note(&app).await;
    let (_, next) = send(&app, get("/validate/api/next-case")).await;
    let case_id = next["case"]["id"].as_i64().unwrap();
    let (status, _) = send(
        &app,
        post_json(
            "/validate/api/submit-validation",
            json!({"case_id": case_id, "is_correct": true, "neurologist_id": "dr_okafor"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, reviewer) = send(&app, get("/validate/api/reviewers/dr_okafor")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviewer["total_validations"], 1);
    assert_eq!(reviewer["agreement_rate"], 1.0);
    assert_eq!(reviewer["subspecialties"], json!(["myasthenia"]));

    let (status, _) = send(&app, get("/validate/api/reviewers/nobody")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_review_queue_flow() {
    let (_dir, app) = app();

    let (_, body) = send(&app, get("/validate/api/next-case")).await;
    assert_eq!(body["status"], "complete");

    analyze_note(&app).await;

    let (status, body) = send(&app, get("/validate/api/next-case")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["case"]["ai_classification"], "Focal impaired awareness seizure");
    let case_id = body["case"]["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        post_json(
            "/validate/api/submit-validation",
            json!({"case_id": case_id, "is_correct": true, "confidence_level": "high"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Validation saved");

    let (_, stats) = send(&app, get("/validate/api/stats")).await;
    assert_eq!(stats["validated_count"], 1);
    assert_eq!(stats["pending_count"], 0);

    let (status, report) = send(&app, Request::post("/learning/run").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["examples_added"], 1);

    let (_, metrics) = send(&app, get("/learning/metrics")).await;
    assert_eq!(metrics["metrics"]["total_validations"], 1);
    assert_eq!(metrics["library"]["categories"]["validated"], 1);
}

#[tokio::test]
async fn test_sampling_disabled() {
    let (_dir, app) = app_with(
        MockTextGenerator::new(BULLET_RESPONSE).with_generated_tokens(64),
        0.0,
    );
    analyze_note(&app).await;

    let (_, body) = send(&app, get("/validate/api/next-case")).await;
    assert_eq!(body["status"], "complete");
}

#[tokio::test]
async fn test_validation_for_unknown_case() {
    let (_dir, app) = app();
    let (status, body) = send(
        &app,
        post_json(
            "/validate/api/submit-validation",
            json!({"case_id": 404, "is_correct": false}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, _) = send(
        &app,
        post_json("/validate/api/submit-validation", json!({"is_correct": true})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rag_endpoints() {
    let (_dir, app) = app();
    let (status, body) = send(&app, get("/rag/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_chunks"], 0);
    assert_eq!(body["embedding_model"], "tfidf-keyword");

    let (status, body) = send(&app, Request::post("/rag/reindex").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
}
