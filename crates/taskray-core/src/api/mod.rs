//! Remote API client.
//!
//! Translates typed fetches into authenticated calls against the fixed
//! remote endpoint, follows offset-cursor pagination, and backs off on
//! rate limiting. The client holds no persistent state; the bearer token is
//! resolved from the credential store just in time for each call and never
//! cached in cleartext beyond it.

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::credentials::{CredentialError, CredentialStore};
use crate::models::{Project, Story, Task, User, Workspace};
use crate::util::compact_text;

const BASE_URL: &str = "https://app.asana.com/api/1.0";
const PAGE_SIZE: u32 = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Total request attempts for a rate-limited call before giving up.
const RATE_LIMIT_ATTEMPTS: u32 = 3;
/// Upper bound on a single `Retry-After` wait.
const RETRY_AFTER_CAP: Duration = Duration::from_secs(120);

const TASK_OPT_FIELDS: &str = "name,assignee.name,completed,due_on,due_at,modified_at,created_at,\
                               num_subtasks,projects.name,memberships.project.name,memberships.section.name";
const PROJECT_OPT_FIELDS: &str =
    "name,color,archived,modified_at,owner.name,members.name,current_status.title,current_status.color";
const USER_OPT_FIELDS: &str = "name,email,photo.image_60x60";
const STORY_OPT_FIELDS: &str = "created_at,created_by.name,text,resource_subtype";

/// Errors from remote API calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No token configured. Raised before any I/O so callers can prompt for
    /// re-authentication instead of retrying.
    #[error("No API token is configured")]
    MissingCredential,

    /// The credential store failed; treated by callers like a missing
    /// credential (the user must re-enter the token).
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// Rate limited and the retry ceiling was reached.
    #[error("Rate limited by the API (gave up after {attempts} attempts)")]
    RateLimited { attempts: u32 },

    /// Transport-level failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the API.
    #[error("API error: {message}")]
    Api { status: u16, message: String },

    /// Malformed response payload.
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Outcome of a credential verification call.
///
/// Invalid-token is an expected outcome, reported as a value so the caller
/// can render inline feedback; only unexpected failures (network) error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialCheck {
    pub valid: bool,
    pub detail: String,
}

/// Authenticated client for the remote API.
#[derive(Clone)]
pub struct ApiClient<C: CredentialStore> {
    base_url: String,
    client: reqwest::Client,
    credentials: C,
}

impl<C: CredentialStore> ApiClient<C> {
    pub fn new(credentials: C) -> ApiResult<Self> {
        Self::with_base_url(credentials, BASE_URL)
    }

    /// Client against a non-default endpoint (tests, proxies).
    pub fn with_base_url(credentials: C, base_url: impl Into<String>) -> ApiResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            base_url,
            client: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            credentials,
        })
    }

    /// The signed-in user.
    pub async fn me(&self) -> ApiResult<User> {
        Ok(self.get_json::<Envelope<User>>("/users/me", &[]).await?.data)
    }

    /// All workspaces visible to the signed-in user, in server order.
    pub async fn workspaces(&self) -> ApiResult<Vec<Workspace>> {
        self.fetch_all("/workspaces", &[]).await
    }

    /// Members of the given workspace.
    pub async fn workspace_users(&self, workspace_gid: &str) -> ApiResult<Vec<User>> {
        self.fetch_all(
            &format!("/workspaces/{workspace_gid}/users"),
            &[("opt_fields", USER_OPT_FIELDS.to_string())],
        )
        .await
    }

    /// Incomplete tasks assigned to one user.
    ///
    /// The search endpoint is over-broad: it may also return tasks where the
    /// user is merely a collaborator. Callers must re-check the assignee.
    pub async fn assigned_tasks(
        &self,
        workspace_gid: &str,
        assignee_gid: &str,
    ) -> ApiResult<Vec<Task>> {
        self.fetch_all(
            &format!("/workspaces/{workspace_gid}/tasks/search"),
            &[
                ("completed", "false".to_string()),
                ("assignee.any", assignee_gid.to_string()),
                ("opt_fields", TASK_OPT_FIELDS.to_string()),
            ],
        )
        .await
    }

    /// All incomplete tasks in the workspace, regardless of assignee.
    pub async fn incomplete_tasks(&self, workspace_gid: &str) -> ApiResult<Vec<Task>> {
        self.fetch_all(
            &format!("/workspaces/{workspace_gid}/tasks/search"),
            &[
                ("completed", "false".to_string()),
                ("opt_fields", TASK_OPT_FIELDS.to_string()),
            ],
        )
        .await
    }

    /// Non-archived projects in the workspace.
    pub async fn active_projects(&self, workspace_gid: &str) -> ApiResult<Vec<Project>> {
        self.fetch_all(
            &format!("/workspaces/{workspace_gid}/projects"),
            &[
                ("archived", "false".to_string()),
                ("opt_fields", PROJECT_OPT_FIELDS.to_string()),
            ],
        )
        .await
    }

    /// Activity feed for one task, oldest first.
    pub async fn task_stories(&self, task_gid: &str) -> ApiResult<Vec<Story>> {
        self.fetch_all(
            &format!("/tasks/{task_gid}/stories"),
            &[("opt_fields", STORY_OPT_FIELDS.to_string())],
        )
        .await
    }

    /// Lightweight "who am I" check.
    pub async fn verify_credential(&self) -> ApiResult<CredentialCheck> {
        match self.me().await {
            Ok(user) => Ok(CredentialCheck {
                valid: true,
                detail: format!(
                    "authenticated as {} <{}>",
                    user.name,
                    user.email.as_deref().unwrap_or("no email")
                ),
            }),
            Err(ApiError::Api {
                status: 401 | 403,
                message,
            }) => Ok(CredentialCheck {
                valid: false,
                detail: message,
            }),
            Err(ApiError::MissingCredential) => Ok(CredentialCheck {
                valid: false,
                detail: "no API token is configured".to_string(),
            }),
            Err(ApiError::Credential(error)) => Ok(CredentialCheck {
                valid: false,
                detail: format!("secure storage unavailable: {error}"),
            }),
            Err(error) => Err(error),
        }
    }

    /// Fetch every page of a collection endpoint.
    ///
    /// Follows the offset cursor until the server stops returning one; K
    /// pages cost exactly K requests.
    async fn fetch_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ApiResult<Vec<T>> {
        let mut items = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut page_query: Vec<(&str, String)> = query.to_vec();
            page_query.push(("limit", PAGE_SIZE.to_string()));
            if let Some(cursor) = &offset {
                page_query.push(("offset", cursor.clone()));
            }

            let page: Page<T> = self.get_json(path, &page_query).await?;
            items.extend(page.data);

            match page.next_page {
                Some(next) => offset = Some(next.offset),
                None => break,
            }
        }

        Ok(items)
    }

    /// Issue one authenticated GET, retrying on rate limits.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        let token = self.bearer_token()?;
        let url = format!("{}{path}", self.base_url);
        let mut attempt: u32 = 0;

        loop {
            let response = self
                .client
                .get(&url)
                .bearer_auth(&token)
                .header(ACCEPT, "application/json")
                .query(&query)
                .send()
                .await?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                attempt += 1;
                if attempt >= RATE_LIMIT_ATTEMPTS {
                    return Err(ApiError::RateLimited { attempts: attempt });
                }
                let delay = rate_limit_delay(attempt, retry_after_seconds(&response));
                tracing::warn!(
                    "rate limited on {path}, retrying in {}s (attempt {attempt})",
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(ApiError::Api {
                    status: status.as_u16(),
                    message: parse_api_error(status, &body),
                });
            }

            return Ok(response.json::<T>().await?);
        }
    }

    fn bearer_token(&self) -> ApiResult<String> {
        self.credentials
            .load_token()?
            .ok_or(ApiError::MissingCredential)
    }
}

/// How long to wait before the next attempt after a 429.
///
/// Honors the server's `Retry-After` up to the cap; without one, backs off
/// exponentially.
fn rate_limit_delay(attempt: u32, retry_after: Option<u64>) -> Duration {
    let delay = retry_after.map_or_else(
        || Duration::from_secs(2u64.pow(attempt)),
        Duration::from_secs,
    );
    delay.min(RETRY_AFTER_CAP)
}

fn retry_after_seconds(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Vec<T>,
    #[serde(default)]
    next_page: Option<NextPage>,
}

#[derive(Debug, Deserialize)]
struct NextPage {
    offset: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    errors: Option<Vec<ApiErrorDetail>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload
            .errors
            .into_iter()
            .flatten()
            .find_map(|detail| detail.message)
        {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact_text(trimmed), status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use axum::extract::{Query, State};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::credentials::MemoryCredentialStore;

    async fn spawn_server(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client_for(base_url: &str) -> ApiClient<MemoryCredentialStore> {
        ApiClient::with_base_url(MemoryCredentialStore::new("test-token"), base_url).unwrap()
    }

    #[test]
    fn rate_limit_delay_caps_retry_after() {
        assert_eq!(
            rate_limit_delay(1, Some(9999)),
            Duration::from_secs(120),
            "Retry-After beyond the cap must be clamped"
        );
        assert_eq!(rate_limit_delay(1, Some(30)), Duration::from_secs(30));
    }

    #[test]
    fn rate_limit_delay_backs_off_exponentially_without_header() {
        assert_eq!(rate_limit_delay(1, None), Duration::from_secs(2));
        assert_eq!(rate_limit_delay(2, None), Duration::from_secs(4));
    }

    #[test]
    fn parse_api_error_prefers_server_message() {
        let body = r#"{"errors":[{"message":"Not Authorized"}]}"#;
        assert_eq!(
            parse_api_error(StatusCode::UNAUTHORIZED, body),
            "Not Authorized (401)"
        );
    }

    #[test]
    fn parse_api_error_falls_back_to_body_then_status() {
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, "upstream down"),
            "upstream down (502)"
        );
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, ""), "HTTP 502");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_credential_fails_before_any_request() {
        let client =
            ApiClient::with_base_url(MemoryCredentialStore::empty(), "http://127.0.0.1:9")
                .unwrap();

        let error = client.workspaces().await.unwrap_err();
        assert!(matches!(error, ApiError::MissingCredential));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_all_concatenates_pages_with_one_request_each() {
        let requests = Arc::new(AtomicU32::new(0));

        async fn pages(
            State(requests): State<Arc<AtomicU32>>,
            Query(params): Query<HashMap<String, String>>,
        ) -> Json<serde_json::Value> {
            requests.fetch_add(1, Ordering::SeqCst);
            let page = match params.get("offset").map(String::as_str) {
                None => json!({
                    "data": [{ "gid": "1", "name": "One" }, { "gid": "2", "name": "Two" }],
                    "next_page": { "offset": "cursor-2" }
                }),
                Some("cursor-2") => json!({
                    "data": [{ "gid": "3", "name": "Three" }, { "gid": "4", "name": "Four" }],
                    "next_page": { "offset": "cursor-3" }
                }),
                Some(_) => json!({
                    "data": [{ "gid": "5", "name": "Five" }],
                    "next_page": null
                }),
            };
            Json(page)
        }

        let app = Router::new()
            .route("/workspaces", get(pages))
            .with_state(Arc::clone(&requests));
        let base_url = spawn_server(app).await;

        let workspaces = client_for(&base_url).workspaces().await.unwrap();

        let gids: Vec<&str> = workspaces.iter().map(|w| w.gid.as_str()).collect();
        assert_eq!(gids, vec!["1", "2", "3", "4", "5"]);
        assert_eq!(requests.load(Ordering::SeqCst), 3, "one request per page");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rate_limit_gives_up_after_three_attempts() {
        let requests = Arc::new(AtomicU32::new(0));

        async fn always_limited(State(requests): State<Arc<AtomicU32>>) -> impl IntoResponse {
            requests.fetch_add(1, Ordering::SeqCst);
            (
                StatusCode::TOO_MANY_REQUESTS,
                [("Retry-After", "0")],
                Json(json!({ "errors": [{ "message": "Rate Limit Enforced" }] })),
            )
        }

        let app = Router::new()
            .route("/workspaces", get(always_limited))
            .with_state(Arc::clone(&requests));
        let base_url = spawn_server(app).await;

        let error = client_for(&base_url).workspaces().await.unwrap_err();

        assert!(matches!(error, ApiError::RateLimited { attempts: 3 }));
        assert_eq!(
            requests.load(Ordering::SeqCst),
            3,
            "no fourth attempt after three consecutive 429s"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn non_success_status_is_terminal() {
        let requests = Arc::new(AtomicU32::new(0));

        async fn server_error(State(requests): State<Arc<AtomicU32>>) -> impl IntoResponse {
            requests.fetch_add(1, Ordering::SeqCst);
            (StatusCode::INTERNAL_SERVER_ERROR, "boom")
        }

        let app = Router::new()
            .route("/workspaces", get(server_error))
            .with_state(Arc::clone(&requests));
        let base_url = spawn_server(app).await;

        let error = client_for(&base_url).workspaces().await.unwrap_err();

        assert!(matches!(error, ApiError::Api { status: 500, .. }));
        assert_eq!(requests.load(Ordering::SeqCst), 1, "no implicit retry");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn verify_credential_reports_valid_token() {
        async fn me() -> Json<serde_json::Value> {
            Json(json!({
                "data": { "gid": "88", "name": "Sam", "email": "sam@example.com" }
            }))
        }

        let app = Router::new().route("/users/me", get(me));
        let base_url = spawn_server(app).await;

        let check = client_for(&base_url).verify_credential().await.unwrap();
        assert!(check.valid);
        assert!(check.detail.contains("sam@example.com"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn verify_credential_reports_invalid_token_without_error() {
        async fn unauthorized() -> impl IntoResponse {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "errors": [{ "message": "Not Authorized" }] })),
            )
        }

        let app = Router::new().route("/users/me", get(unauthorized));
        let base_url = spawn_server(app).await;

        let check = client_for(&base_url).verify_credential().await.unwrap();
        assert!(!check.valid);
        assert!(check.detail.contains("Not Authorized"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn verify_credential_reports_missing_token_without_error() {
        let client =
            ApiClient::with_base_url(MemoryCredentialStore::empty(), "http://127.0.0.1:9")
                .unwrap();

        let check = client.verify_credential().await.unwrap();
        assert!(!check.valid);
    }
}
