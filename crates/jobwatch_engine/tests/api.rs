use std::sync::Arc;

use jobwatch_engine::{
    ApiSettings, CredentialProvider, FailureKind, FormField, JobApi, RemoteStatus, ReqwestJobApi,
    ScriptKind, SessionContext, StartRequest,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, session: Arc<SessionContext>) -> ReqwestJobApi {
    let settings = ApiSettings {
        base_url: format!("{}/api", server.uri()),
        ..ApiSettings::default()
    };
    ReqwestJobApi::new(settings, session).expect("client")
}

fn authed(server: &MockServer) -> ReqwestJobApi {
    client_for(server, Arc::new(SessionContext::with_token("tok-1")))
}

#[tokio::test]
async fn start_job_posts_multipart_with_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/daily-post/start"))
        .and(header("authorization", "Bearer tok-1"))
        .and(body_string_contains("name=\"media_file\""))
        .and(body_string_contains("photo-bytes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "script_id": "job-42",
            "status": "started",
            "message": "Daily post script started successfully"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let media = dir.path().join("photo.jpg");
    std::fs::write(&media, "photo-bytes").unwrap();

    let request = StartRequest {
        kind: ScriptKind::DailyPost,
        fields: vec![
            FormField::Text {
                name: "account_ids".into(),
                value: r#"["1"]"#.into(),
            },
            FormField::File {
                name: "media_file".into(),
                path: media,
            },
        ],
    };

    let started = authed(&server).start_job(&request).await.expect("start ok");
    assert_eq!(started.script_id, "job-42");
    assert_eq!(started.status.as_deref(), Some("started"));
}

#[tokio::test]
async fn unreadable_attachment_never_reaches_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let request = StartRequest {
        kind: ScriptKind::DmAutomation,
        fields: vec![FormField::File {
            name: "target_file".into(),
            path: "/definitely/not/here.csv".into(),
        }],
    };

    let err = authed(&server).start_job(&request).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Attachment);
}

#[tokio::test]
async fn empty_script_id_is_a_decode_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/warmup/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "script_id": "" })))
        .mount(&server)
        .await;

    let request = StartRequest {
        kind: ScriptKind::Warmup,
        fields: Vec::new(),
    };
    let err = authed(&server).start_job(&request).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Decode);
}

#[tokio::test]
async fn server_error_detail_becomes_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/dm-automation/start"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "detail": { "error": "No accounts selected" }
        })))
        .mount(&server)
        .await;

    let request = StartRequest {
        kind: ScriptKind::DmAutomation,
        fields: Vec::new(),
    };
    let err = authed(&server).start_job(&request).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(400));
    assert_eq!(err.message, "No accounts selected");
}

#[tokio::test]
async fn unauthorized_is_reported_distinctly() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/script/job-1/status"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "detail": "Not authenticated" })),
        )
        .mount(&server)
        .await;

    let err = authed(&server).job_status("job-1").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(err.message, "Not authenticated");
}

#[tokio::test]
async fn status_and_logs_decode() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/script/job-1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "daily_post",
            "status": "error",
            "start_time": "2024-05-01T10:00:00.5",
            "end_time": "2024-05-01T10:05:00",
            "error": "Upload rejected"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/script/job-1/logs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "logs": ["[2024-05-01 10:00:00] [INFO] [Account 1] Logged in"]
        })))
        .mount(&server)
        .await;

    let api = authed(&server);
    let report = api.job_status("job-1").await.expect("status");
    assert_eq!(report.status, RemoteStatus::Error);
    assert_eq!(report.error.as_deref(), Some("Upload rejected"));
    assert!(report.ended_at().is_some());

    let logs = api.job_logs("job-1").await.expect("logs");
    assert_eq!(logs.logs.len(), 1);
}

#[tokio::test]
async fn stop_sends_reason() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/script/job-9/stop"))
        .and(body_json(json!({ "reason": "Browser closed by user" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "message": "Script stopped successfully",
            "reason": "Browser closed by user"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let stopped = authed(&server)
        .stop_job("job-9", "Browser closed by user")
        .await
        .expect("stop ok");
    assert_eq!(stopped.status, "success");
}

#[tokio::test]
async fn download_respects_size_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/script/job-1/download-logs"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 64]))
        .mount(&server)
        .await;

    let settings = ApiSettings {
        base_url: format!("{}/api", server.uri()),
        max_download_bytes: 16,
        ..ApiSettings::default()
    };
    let api = ReqwestJobApi::new(settings, Arc::new(SessionContext::with_token("t"))).unwrap();
    let err = api.download_logs("job-1").await.unwrap_err();
    assert_eq!(err.kind, FailureKind::TooLarge { max_bytes: 16 });

    let body = authed(&server).download_logs("job-1").await.expect("download");
    assert_eq!(body.len(), 64);
}

#[tokio::test]
async fn list_jobs_and_clear_logs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/scripts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "b": { "type": "warmup", "status": "running", "start_time": "2024-05-01T10:00:00" },
            "a": { "type": "daily_post", "status": "completed" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/script/a/clear-logs"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "message": "Logs cleared" })),
        )
        .mount(&server)
        .await;

    let api = authed(&server);
    let jobs = api.list_jobs().await.expect("list");
    assert_eq!(jobs.keys().cloned().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(jobs["b"].status, RemoteStatus::Running);
    assert_eq!(api.clear_logs("a").await.expect("clear"), "Logs cleared");
}

#[tokio::test]
async fn login_returns_token_or_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({ "username": "admin", "password": "pw" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "token": "fresh-token",
            "user": { "username": "admin" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({ "username": "admin", "password": "bad" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "Invalid credentials"
        })))
        .mount(&server)
        .await;

    let session = Arc::new(SessionContext::new());
    let api = client_for(&server, session.clone());
    let token = api.login("admin", "pw").await.expect("login");
    assert_eq!(token, "fresh-token");
    assert!(session.bearer_token().is_none());

    let err = api.login("admin", "bad").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(err.message, "Invalid credentials");
}

#[tokio::test]
async fn active_accounts_are_listed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/instagram-accounts/active"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "accounts": [
                { "id": "a1", "username": "alice", "password": "pw", "is_active": true },
                { "id": "b2", "username": "bob", "last_used": "2024-05-01T10:00:00" }
            ]
        })))
        .mount(&server)
        .await;

    let accounts = authed(&server).active_accounts().await.expect("accounts");
    let ids: Vec<&str> = accounts.iter().map(|account| account.id.as_str()).collect();
    assert_eq!(ids, vec!["a1", "b2"]);
    assert_eq!(accounts[1].last_used.as_deref(), Some("2024-05-01T10:00:00"));
}

#[tokio::test]
async fn responses_without_a_file_carry_the_server_note() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/script/dm-1/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "responses": [],
            "message": "No responses found for this script."
        })))
        .mount(&server)
        .await;

    let report = authed(&server).job_responses("dm-1").await.expect("responses");
    assert!(report.responses.is_empty());
    assert_eq!(
        report.message.as_deref(),
        Some("No responses found for this script.")
    );
}

#[tokio::test]
async fn stats_decode_per_type_counts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/scripts/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user_id": "u1",
            "user_role": "va",
            "total_scripts": 3,
            "running_scripts": 1,
            "completed_scripts": 2,
            "error_scripts": 0,
            "stopped_scripts": 0,
            "script_types": { "warmup": { "total": 3, "running": 1, "completed": 2, "error": 0, "stopped": 0 } },
            "recent_scripts": []
        })))
        .mount(&server)
        .await;

    let stats = authed(&server).job_stats().await.expect("stats");
    assert_eq!(stats.total_scripts, 3);
    assert_eq!(stats.script_types["warmup"].completed, 2);
}

#[tokio::test]
async fn expired_token_fails_verification() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/verify-token"))
        .and(body_json(json!({ "token": "old" })))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": { "success": false, "message": "Token expired" }
        })))
        .mount(&server)
        .await;

    let err = authed(&server).verify_token("old").await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Unauthorized);
    assert_eq!(err.message, "Token expired");
}

#[tokio::test]
async fn valid_token_reports_its_user() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/verify-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "payload": { "user_id": "u1", "username": "va1", "name": "VA One", "role": "va", "exp": 1 }
        })))
        .mount(&server)
        .await;

    let info = authed(&server).verify_token("tok-1").await.expect("verified");
    assert_eq!(info.username.as_deref(), Some("va1"));
    assert_eq!(info.role.as_deref(), Some("va"));
}

#[tokio::test]
async fn rejected_media_lists_every_reason() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/daily-post/validate"))
        .and(body_string_contains("name=\"media_file\""))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "detail": { "valid": false, "errors": ["Invalid media file format. Use supported image/video formats"] }
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let media = dir.path().join("notes.txt");
    std::fs::write(&media, "text").unwrap();

    let err = authed(&server).validate_media(&media).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(400));
    assert_eq!(
        err.message,
        "Invalid media file format. Use supported image/video formats"
    );
}

#[tokio::test]
async fn logout_sends_the_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Logged out successfully"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let message = authed(&server).logout().await.expect("logout");
    assert_eq!(message, "Logged out successfully");
}
