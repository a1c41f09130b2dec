use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use jobwatch_logging::{jobwatch_debug, jobwatch_info, jobwatch_warn};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::session::CredentialProvider;
use crate::{
    Account, ApiError, FailureKind, FormField, JobStats, JobSummary, LogSnapshot, MediaCheck,
    ResponseReport, StartRequest, StartResponse, StatusReport, StopResponse, TokenInfo,
};

#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Base URL including the `/api` prefix.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_download_bytes: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_download_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Remote job endpoints. Every call is bound to one job id except start, the
/// listings, and the account lookup.
#[async_trait::async_trait]
pub trait JobApi: Send + Sync {
    async fn start_job(&self, request: &StartRequest) -> Result<StartResponse, ApiError>;
    async fn job_status(&self, job_id: &str) -> Result<StatusReport, ApiError>;
    async fn job_logs(&self, job_id: &str) -> Result<LogSnapshot, ApiError>;
    async fn stop_job(&self, job_id: &str, reason: &str) -> Result<StopResponse, ApiError>;
    async fn download_logs(&self, job_id: &str) -> Result<Bytes, ApiError>;
    async fn clear_logs(&self, job_id: &str) -> Result<String, ApiError>;
    async fn list_jobs(&self) -> Result<BTreeMap<String, JobSummary>, ApiError>;
    async fn job_stats(&self) -> Result<JobStats, ApiError>;
    async fn job_responses(&self, job_id: &str) -> Result<ResponseReport, ApiError>;
    /// Accounts a launch may pick its `account_ids` from.
    async fn active_accounts(&self) -> Result<Vec<Account>, ApiError>;
}

pub struct ReqwestJobApi {
    client: reqwest::Client,
    settings: ApiSettings,
    credentials: Arc<dyn CredentialProvider>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    payload: Option<TokenInfo>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountList {
    #[serde(default)]
    accounts: Vec<Account>,
}

impl ReqwestJobApi {
    pub fn new(
        settings: ApiSettings,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            client,
            settings,
            credentials,
        })
    }

    /// Exchange credentials for a bearer token. The caller decides where to keep it.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let body = serde_json::json!({
            "username": username,
            "password": password,
        });
        jobwatch_info!("POST /auth/login user={}", username);
        let response = self
            .send(self.client.post(self.url("/auth/login")).json(&body))
            .await?;
        let login: LoginResponse = parse_json(response).await?;
        match login.token {
            Some(token) if login.success && !token.is_empty() => Ok(token),
            _ => Err(ApiError::new(
                FailureKind::Unauthorized,
                login.message.unwrap_or_else(|| "login rejected".to_string()),
            )),
        }
    }

    /// Checks a token without making it the session's credential.
    pub async fn verify_token(&self, token: &str) -> Result<TokenInfo, ApiError> {
        jobwatch_debug!("POST /auth/verify-token");
        let body = serde_json::json!({ "token": token });
        let response = self
            .send(self.client.post(self.url("/auth/verify-token")).json(&body))
            .await?;
        let verified: VerifyResponse = parse_json(response).await?;
        match verified.payload {
            Some(info) if verified.success => Ok(info),
            _ => Err(ApiError::new(
                FailureKind::Unauthorized,
                verified
                    .message
                    .unwrap_or_else(|| "token rejected".to_string()),
            )),
        }
    }

    pub async fn logout(&self) -> Result<String, ApiError> {
        jobwatch_info!("POST /auth/logout");
        let builder = self.authorized(self.client.post(self.url("/auth/logout")));
        let response = self.send(builder).await?;
        let done: MessageResponse = parse_json(response).await?;
        Ok(done
            .message
            .unwrap_or_else(|| "Logged out".to_string()))
    }

    /// Asks the backend whether `media` is an acceptable daily-post upload.
    pub async fn validate_media(&self, media: &Path) -> Result<MediaCheck, ApiError> {
        jobwatch_info!("POST /daily-post/validate file={}", media.display());
        let form = Form::new().part("media_file", file_part(media).await?);
        let builder = self.authorized(
            self.client
                .post(self.url("/daily-post/validate"))
                .multipart(form),
        );
        let response = self.send(builder).await?;
        parse_json(response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.credentials.bearer_token() {
            Some(token) => builder.bearer_auth(token),
            None => {
                jobwatch_warn!("Sending request without a bearer token");
                builder
            }
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await.map_err(map_reqwest_error)?;
        ensure_success(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        jobwatch_debug!("GET {}", path);
        let builder = self.authorized(self.client.get(self.url(path)));
        let response = self.send(builder).await?;
        parse_json(response).await
    }
}

#[async_trait::async_trait]
impl JobApi for ReqwestJobApi {
    async fn start_job(&self, request: &StartRequest) -> Result<StartResponse, ApiError> {
        let path = request.kind.start_path();
        jobwatch_info!("POST {} fields={}", path, request.fields.len());
        let form = build_form(&request.fields).await?;
        let builder = self.authorized(self.client.post(self.url(path)).multipart(form));
        let response = self.send(builder).await?;
        let started: StartResponse = parse_json(response).await?;
        if started.script_id.trim().is_empty() {
            return Err(ApiError::new(
                FailureKind::Decode,
                "server returned an empty job id",
            ));
        }
        jobwatch_info!("Started job {} via {}", started.script_id, path);
        Ok(started)
    }

    async fn job_status(&self, job_id: &str) -> Result<StatusReport, ApiError> {
        self.get_json(&format!("/script/{job_id}/status")).await
    }

    async fn job_logs(&self, job_id: &str) -> Result<LogSnapshot, ApiError> {
        self.get_json(&format!("/script/{job_id}/logs")).await
    }

    async fn stop_job(&self, job_id: &str, reason: &str) -> Result<StopResponse, ApiError> {
        let path = format!("/script/{job_id}/stop");
        jobwatch_info!("POST {} reason={:?}", path, reason);
        let body = serde_json::json!({ "reason": reason });
        let builder = self.authorized(self.client.post(self.url(&path)).json(&body));
        let response = self.send(builder).await?;
        parse_json(response).await
    }

    async fn download_logs(&self, job_id: &str) -> Result<Bytes, ApiError> {
        let path = format!("/script/{job_id}/download-logs");
        jobwatch_info!("GET {}", path);
        let max_bytes = self.settings.max_download_bytes;
        let builder = self.authorized(self.client.get(self.url(&path)));
        let response = self.send(builder).await?;

        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(ApiError::new(
                    FailureKind::TooLarge { max_bytes },
                    format!("log file is {content_len} bytes"),
                ));
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            if body.len() as u64 + chunk.len() as u64 > max_bytes {
                return Err(ApiError::new(
                    FailureKind::TooLarge { max_bytes },
                    "log file exceeded the download limit",
                ));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(body))
    }

    async fn clear_logs(&self, job_id: &str) -> Result<String, ApiError> {
        let path = format!("/script/{job_id}/clear-logs");
        jobwatch_info!("POST {}", path);
        let builder = self.authorized(self.client.post(self.url(&path)));
        let response = self.send(builder).await?;
        let cleared: MessageResponse = parse_json(response).await?;
        Ok(cleared
            .message
            .unwrap_or_else(|| "Logs cleared".to_string()))
    }

    async fn list_jobs(&self) -> Result<BTreeMap<String, JobSummary>, ApiError> {
        self.get_json("/scripts").await
    }

    async fn job_stats(&self) -> Result<JobStats, ApiError> {
        self.get_json("/scripts/stats").await
    }

    async fn job_responses(&self, job_id: &str) -> Result<ResponseReport, ApiError> {
        self.get_json(&format!("/script/{job_id}/responses")).await
    }

    async fn active_accounts(&self) -> Result<Vec<Account>, ApiError> {
        let list: AccountList = self.get_json("/instagram-accounts/active").await?;
        Ok(list.accounts)
    }
}

async fn build_form(fields: &[FormField]) -> Result<Form, ApiError> {
    let mut form = Form::new();
    for field in fields {
        form = match field {
            FormField::Text { name, value } => form.text(name.clone(), value.clone()),
            FormField::File { name, path } => {
                let part = file_part(path).await?;
                form.part(name.clone(), part)
            }
        };
    }
    Ok(form)
}

async fn file_part(path: &Path) -> Result<Part, ApiError> {
    let bytes = tokio::fs::read(path).await.map_err(|err| {
        ApiError::new(
            FailureKind::Attachment,
            format!("{}: {err}", path.display()),
        )
    })?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(Part::bytes(bytes).file_name(file_name))
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    let message = error_message(&body).unwrap_or_else(|| status.to_string());
    if status == StatusCode::UNAUTHORIZED {
        jobwatch_warn!("Credential rejected: {}", message);
        return Err(ApiError::new(FailureKind::Unauthorized, message));
    }
    Err(ApiError::new(
        FailureKind::HttpStatus(status.as_u16()),
        message,
    ))
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&bytes).map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => {
            let trimmed = body.trim();
            return (!trimmed.is_empty()).then(|| trimmed.to_string());
        }
    };
    if let Some(errors) = value.pointer("/detail/errors").and_then(|v| v.as_array()) {
        let joined: Vec<&str> = errors.iter().filter_map(|error| error.as_str()).collect();
        if !joined.is_empty() {
            return Some(joined.join("; "));
        }
    }
    let candidates = [
        value.pointer("/detail/error"),
        value.pointer("/detail/message"),
        value.pointer("/error"),
        value.pointer("/message"),
        value.pointer("/detail"),
    ];
    let found = candidates
        .into_iter()
        .flatten()
        .find_map(|candidate| candidate.as_str().map(str::to_owned));
    found
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ApiError::new(FailureKind::Decode, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::error_message;

    #[test]
    fn fastapi_detail_error_is_preferred() {
        let body = r#"{"detail":{"error":"Invalid account IDs format"}}"#;
        assert_eq!(
            error_message(body).as_deref(),
            Some("Invalid account IDs format")
        );
    }

    #[test]
    fn string_detail_is_used() {
        let body = r#"{"detail":"Not authenticated"}"#;
        assert_eq!(error_message(body).as_deref(), Some("Not authenticated"));
    }

    #[test]
    fn plain_text_body_is_returned_trimmed() {
        assert_eq!(
            error_message("  Bad gateway \n").as_deref(),
            Some("Bad gateway")
        );
        assert_eq!(error_message("   "), None);
    }

    #[test]
    fn validation_errors_are_joined() {
        let body = r#"{"detail":{"valid":false,"errors":["Media file is required","Bad format"]}}"#;
        assert_eq!(
            error_message(body).as_deref(),
            Some("Media file is required; Bad format")
        );
    }

    #[test]
    fn json_without_message_yields_none() {
        assert_eq!(error_message(r#"{"ok":false}"#), None);
    }
}
