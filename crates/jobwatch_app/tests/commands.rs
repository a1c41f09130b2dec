use std::sync::Arc;

use jobwatch_app::platform::commands;
use jobwatch_engine::{ApiSettings, ReqwestJobApi, SessionContext};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_for(server: &MockServer) -> ReqwestJobApi {
    ReqwestJobApi::new(
        ApiSettings {
            base_url: format!("{}/api", server.uri()),
            ..ApiSettings::default()
        },
        Arc::new(SessionContext::with_token("tok")),
    )
    .unwrap()
}

fn text(out: Vec<u8>) -> String {
    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn status_prints_error_detail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/script/abc/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "dm_automation",
            "status": "error",
            "start_time": "2024-05-01T10:00:00",
            "error": "Target file is empty"
        })))
        .mount(&server)
        .await;

    let mut out = Vec::new();
    commands::print_status(&api_for(&server), "abc", &mut out)
        .await
        .unwrap();
    let out = text(out);
    assert!(out.starts_with("abc: error\n"));
    assert!(out.contains("type:    dm_automation"));
    assert!(out.contains("error:   Target file is empty"));
}

#[tokio::test]
async fn download_saves_into_directory() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/script/abc/download-logs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[2024-05-01 10:00:00] [INFO] done\n"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut out = Vec::new();
    commands::download_logs(&api_for(&server), "abc", dir.path(), &mut out)
        .await
        .unwrap();

    let saved = dir.path().join("script_abc_logs.txt");
    assert_eq!(text(out).trim(), saved.display().to_string());
    assert_eq!(
        std::fs::read_to_string(saved).unwrap(),
        "[2024-05-01 10:00:00] [INFO] done\n"
    );
}

#[tokio::test]
async fn list_prints_one_row_per_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/scripts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "j2": { "type": "warmup", "status": "running", "start_time": "2024-05-01T10:00:00" },
            "j1": { "type": "daily_post", "status": "completed" }
        })))
        .mount(&server)
        .await;

    let mut out = Vec::new();
    commands::list_jobs(&api_for(&server), &mut out).await.unwrap();
    let out = text(out);
    let rows: Vec<&str> = out.lines().collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].starts_with("j1  completed"));
    assert!(rows[1].contains("warmup"));
}

#[tokio::test]
async fn stop_failure_carries_context() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/script/abc/stop"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "detail": "Script not found" })),
        )
        .mount(&server)
        .await;

    let mut out = Vec::new();
    let err = commands::stop(&api_for(&server), "abc", "Script stopped by user", &mut out)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "could not stop abc");
    assert!(format!("{err:#}").contains("Script not found"));
}

#[tokio::test]
async fn accounts_print_ids_for_launch_flags() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/instagram-accounts/active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "accounts": [
                { "id": "a1", "username": "alice", "password": "pw" },
                { "id": "b2", "username": "bob", "last_used": "2024-05-01T10:00:00" }
            ]
        })))
        .mount(&server)
        .await;

    let mut out = Vec::new();
    commands::list_accounts(&api_for(&server), &mut out)
        .await
        .unwrap();
    let out = text(out);
    let rows: Vec<&str> = out.lines().collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].starts_with("a1  alice"));
    assert!(rows[0].ends_with("last used never"));
    assert!(rows[1].ends_with("last used 2024-05-01T10:00:00"));
    assert!(!out.contains("pw"));
}

#[tokio::test]
async fn responses_are_grouped_by_account() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/script/dm-1/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "responses": [
                { "account": "bob", "responder": "fan1", "message": "interested", "timestamp": "t1" },
                { "account": "alice", "responder": "fan2", "message": "yes please", "timestamp": "t2" },
                { "account": "bob", "responder": "fan3", "message": "tell me more", "timestamp": "t3" }
            ],
            "total_responses": 3,
            "accounts_with_responses": 2
        })))
        .mount(&server)
        .await;

    let mut out = Vec::new();
    commands::print_responses(&api_for(&server), "dm-1", &mut out)
        .await
        .unwrap();
    assert_eq!(
        text(out),
        "3 responses from 2 accounts\n\
         alice:\n  fan2: yes please\n\
         bob:\n  fan1: interested\n  fan3: tell me more\n"
    );
}

#[tokio::test]
async fn empty_responses_show_the_server_note() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/script/dm-2/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "responses": [],
            "message": "No responses found for this script."
        })))
        .mount(&server)
        .await;

    let mut out = Vec::new();
    commands::print_responses(&api_for(&server), "dm-2", &mut out)
        .await
        .unwrap();
    assert_eq!(text(out), "No responses found for this script.\n");
}

#[tokio::test]
async fn stats_print_totals_then_types() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/scripts/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_scripts": 2,
            "running_scripts": 1,
            "completed_scripts": 1,
            "error_scripts": 0,
            "stopped_scripts": 0,
            "script_types": {
                "warmup": { "total": 2, "running": 1, "completed": 1, "error": 0, "stopped": 0 }
            }
        })))
        .mount(&server)
        .await;

    let mut out = Vec::new();
    commands::print_stats(&api_for(&server), &mut out).await.unwrap();
    let out = text(out);
    assert!(out.starts_with("2 jobs: 1 running, 1 completed, 0 error, 0 stopped\n"));
    assert!(out.contains("warmup"));
}
