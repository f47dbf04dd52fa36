//! Submit and collect flows against a mock classification service
//!
//! The mock implements the three batch endpoints the client touches:
//! create, status, and results. Tests are serialized because the client
//! reads its API key from the environment.

use std::fs;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use serial_test::serial;
use tempfile::TempDir;

use courtpulse_common::config::PipelineConfig;
use courtpulse_common::state::{BatchJob, BatchStatus, PipelineState, RequestCounts};
use courtpulse_common::DataPaths;
use courtpulse_pipeline::commands::{collect, submit};

#[derive(Clone, Default)]
struct MockClassifier {
    /// One entry per create call: the API key seen and the request count
    submissions: Arc<Mutex<Vec<(String, usize)>>>,
}

async fn create_batch(
    State(state): State<MockClassifier>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let count = body["requests"].as_array().map(|a| a.len()).unwrap_or(0);

    let mut submissions = state.submissions.lock().unwrap();
    submissions.push((key, count));
    let id = format!("msgbatch_{:03}", submissions.len());
    Json(json!({
        "id": id,
        "processing_status": "in_progress",
        "request_counts": {
            "processing": count, "succeeded": 0, "errored": 0, "canceled": 0, "expired": 0
        }
    }))
}

async fn batch_status(Path(id): Path<String>) -> Json<Value> {
    let (succeeded, errored) = match id.as_str() {
        "msgbatch_001" => (1, 1),
        _ => (1, 0),
    };
    Json(json!({
        "id": id,
        "processing_status": "ended",
        "request_counts": {
            "processing": 0, "succeeded": succeeded, "errored": errored,
            "canceled": 0, "expired": 0
        },
        "ended_at": "2025-01-15T12:00:00Z",
        "results_url": format!("/v1/messages/batches/{}/results", id)
    }))
}

fn succeeded_line(id: &str, text: &str, input_tokens: u64, output_tokens: u64) -> String {
    json!({
        "custom_id": id,
        "result": {
            "type": "succeeded",
            "message": {
                "content": [{"type": "text", "text": text}],
                "usage": {"input_tokens": input_tokens, "output_tokens": output_tokens}
            }
        }
    })
    .to_string()
}

fn errored_line(id: &str) -> String {
    json!({
        "custom_id": id,
        "result": {"type": "errored", "error": {"type": "api_error", "message": "overloaded"}}
    })
    .to_string()
}

async fn batch_results(Path(id): Path<String>) -> String {
    match id.as_str() {
        "msgbatch_001" => [
            succeeded_line("c1", r#"{"s":"neg","c":0.92,"p":"LeBron James"}"#, 60, 10),
            errored_line("c2"),
        ]
        .join("\n"),
        _ => succeeded_line("c3", r#"{"s":"pos","c":0.8,"p":null}"#, 55, 12),
    }
}

async fn spawn_mock() -> (String, Arc<Mutex<Vec<(String, usize)>>>) {
    let state = MockClassifier::default();
    let submissions = Arc::clone(&state.submissions);
    let app = Router::new()
        .route("/v1/messages/batches", post(create_batch))
        .route("/v1/messages/batches/:id", get(batch_status))
        .route("/v1/messages/batches/:id/results", get(batch_results))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), submissions)
}

fn request_line(id: &str) -> String {
    json!({
        "custom_id": id,
        "params": {
            "model": "claude-haiku-4-5-20251001",
            "max_tokens": 50,
            "temperature": 0.0,
            "messages": [{"role": "user", "content": format!("Classify {}", id)}]
        }
    })
    .to_string()
}

fn write_request_files(paths: &DataPaths) {
    fs::create_dir_all(paths.requests_dir()).unwrap();
    fs::write(
        paths.request_file(1),
        format!("{}\n{}\n", request_line("c1"), request_line("c2")),
    )
    .unwrap();
    fs::write(paths.request_file(2), format!("{}\n", request_line("c3"))).unwrap();
}

fn comment_line(id: &str, body: &str, player: &str) -> String {
    json!({
        "id": id,
        "body": body,
        "author": "a",
        "created_utc": 1_728_950_400,
        "score": 1,
        "mentioned_players": [player]
    })
    .to_string()
}

fn write_mentions_file(paths: &DataPaths) {
    fs::create_dir_all(paths.filtered_dir()).unwrap();
    let lines = [
        comment_line("c1", "LeBron is washed", "LeBron James"),
        comment_line("c2", "bron in the clutch", "LeBron James"),
        comment_line("c3", "Ja with the steal", "Ja Morant"),
    ];
    fs::write(paths.mentions_file(), lines.join("\n")).unwrap();
}

#[tokio::test]
#[serial]
async fn test_submit_records_batches_and_skips_resubmission() {
    let (base, submissions) = spawn_mock().await;
    let dir = TempDir::new().unwrap();
    let paths = DataPaths::new(dir.path());
    write_request_files(&paths);

    std::env::set_var("ANTHROPIC_API_KEY", "test-key");
    let mut config = PipelineConfig::default();
    config.classifier.base_url = base;

    submit::run(
        submit::SubmitArgs {
            dry_run: false,
            batches: None,
            requests_dir: None,
        },
        &config,
        &paths,
    )
    .await
    .unwrap();

    {
        let log = submissions.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0], ("test-key".to_string(), 2));
        assert_eq!(log[1], ("test-key".to_string(), 1));
    }

    let state = PipelineState::load(&paths.state_file()).unwrap();
    assert_eq!(state.batches.len(), 2);
    assert_eq!(state.batches[0].batch_num, 1);
    assert_eq!(state.batches[0].batch_id, "msgbatch_001");
    assert_eq!(state.batches[0].request_file, "batch_001.jsonl");
    assert_eq!(state.batches[0].status, BatchStatus::InProgress);
    assert!(!state.batches[0].results_downloaded);
    assert_eq!(state.batches[1].batch_id, "msgbatch_002");

    // Rerunning submits nothing: both files are already in the ledger
    submit::run(
        submit::SubmitArgs {
            dry_run: false,
            batches: None,
            requests_dir: None,
        },
        &config,
        &paths,
    )
    .await
    .unwrap();
    assert_eq!(submissions.lock().unwrap().len(), 2);
}

#[tokio::test]
#[serial]
async fn test_collect_downloads_results_and_builds_output() {
    let (base, _submissions) = spawn_mock().await;
    let dir = TempDir::new().unwrap();
    let paths = DataPaths::new(dir.path());
    write_mentions_file(&paths);

    std::env::set_var("ANTHROPIC_API_KEY", "test-key");
    let mut config = PipelineConfig::default();
    config.classifier.base_url = base;

    // Ledger as the submit step leaves it: both batches still in progress
    fs::create_dir_all(paths.batches_dir()).unwrap();
    let seeded = PipelineState {
        batches: vec![
            BatchJob {
                batch_num: 1,
                batch_id: "msgbatch_001".to_string(),
                request_file: "batch_001.jsonl".to_string(),
                status: BatchStatus::InProgress,
                submitted_at: chrono::Utc::now(),
                ended_at: None,
                results_url: None,
                request_counts: RequestCounts::default(),
                results_downloaded: false,
            },
            BatchJob {
                batch_num: 2,
                batch_id: "msgbatch_002".to_string(),
                request_file: "batch_002.jsonl".to_string(),
                status: BatchStatus::InProgress,
                submitted_at: chrono::Utc::now(),
                ended_at: None,
                results_url: None,
                request_counts: RequestCounts::default(),
                results_downloaded: false,
            },
        ],
        ..Default::default()
    };
    seeded.save(&paths.state_file()).unwrap();

    collect::run(
        collect::CollectArgs {
            poll_interval: 1,
            max_wait: 30,
            no_wait: true,
        },
        &config,
        &paths,
    )
    .await
    .unwrap();

    // Raw results were saved per batch
    assert!(paths.results_file(1).exists());
    assert!(paths.results_file(2).exists());

    // Errored request went to the failures file, not the classified output
    let classified = fs::read_to_string(paths.classified_file()).unwrap();
    let rows: Vec<Value> = classified
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["comment_id"], "c1");
    assert_eq!(rows[0]["sentiment"], "neg");
    assert_eq!(rows[0]["sentiment_player"], "LeBron James");
    assert_eq!(rows[0]["body"], "LeBron is washed");
    assert_eq!(rows[1]["comment_id"], "c3");
    assert_eq!(rows[1]["sentiment"], "pos");
    assert_eq!(rows[1]["sentiment_player"], Value::Null);

    let failed = fs::read_to_string(paths.failed_requests_file()).unwrap();
    let failed_rows: Vec<Value> = failed
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(failed_rows.len(), 1);
    assert_eq!(failed_rows[0]["custom_id"], "c2");
    assert_eq!(failed_rows[0]["result_type"], "errored");

    // Ledger reflects the terminal state and the rebuilt token totals
    let state = PipelineState::load(&paths.state_file()).unwrap();
    assert!(state.batches.iter().all(|b| b.status.is_ended()));
    assert!(state.batches.iter().all(|b| b.results_downloaded));
    assert_eq!(state.batches[0].request_counts.succeeded, 1);
    assert_eq!(state.batches[0].request_counts.errored, 1);
    assert_eq!(state.total_input_tokens, 115);
    assert_eq!(state.total_output_tokens, 22);
    assert!(state.estimated_cost_usd > 0.0);
}
