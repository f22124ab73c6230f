//! API client for the Task To Do REST API.
//!
//! `ApiClient` holds no session state: every authenticated call takes the
//! `Credential` to send. Non-2xx responses become `ApiError::Http`, bodies
//! that fail to parse become `ApiError::Decode`, and nothing is retried.

use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::Credential;
use crate::models::{NewProject, Project, ProjectPage, UserIdentity};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Base URL of the hosted sandbox API
pub const DEFAULT_BASE_URL: &str = "https://sandbox.academiadevelopers.com";

const AUTH_PATH: &str = "/api-auth/";
const PROFILE_PATH: &str = "/users/profiles/profile_data/";
const PROJECTS_PATH: &str = "/taskmanager/projects/";

/// HTTP request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Upper bound on pages followed by `list_all_projects`
const MAX_PAGES: usize = 100;

#[derive(Debug, Serialize)]
struct AuthRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
}

/// DRF reports bad credentials either as `detail` or `non_field_errors`
#[derive(Debug, Default, Deserialize)]
struct AuthFailure {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    non_field_errors: Vec<String>,
}

impl AuthFailure {
    fn into_detail(self) -> Option<String> {
        self.detail.or_else(|| self.non_field_errors.into_iter().next())
    }
}

/// API client for the Task To Do service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client with the default request timeout
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn project_url(&self, id: i64) -> String {
        format!("{}{}{}/", self.base_url, PROJECTS_PATH, id)
    }

    fn is_same_origin(&self, url: &str) -> bool {
        url.strip_prefix(&self.base_url)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'))
    }

    fn request(
        &self,
        method: Method,
        url: &str,
        credential: Option<&Credential>,
    ) -> RequestBuilder {
        let mut req = self
            .client
            .request(method, url)
            .header(header::ACCEPT, "application/json");
        if let Some(credential) = credential {
            req = req.header(header::AUTHORIZATION, credential.authorization_value());
        }
        req
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response, context: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::decode(context, e))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        credential: &Credential,
        url: &str,
    ) -> Result<T, ApiError> {
        debug!(url = url, "GET");
        let response = self.request(Method::GET, url, Some(credential)).send().await?;
        let response = Self::check_response(response).await?;
        Self::decode(response, url).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        credential: &Credential,
        url: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        debug!(url = url, "POST");
        let response = self
            .request(Method::POST, url, Some(credential))
            .json(body)
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        Self::decode(response, url).await
    }

    // ===== Authentication =====

    /// Exchange username and password for a token.
    ///
    /// Rejections and malformed replies both surface as `ApiError::Auth`
    /// carrying the server's detail text when it sent one.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Credential, ApiError> {
        let url = self.url(AUTH_PATH);
        debug!(username = username, "Authenticating");

        let response = self
            .request(Method::POST, &url, None)
            .json(&AuthRequest { username, password })
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let detail = serde_json::from_str::<AuthFailure>(&text)
                .ok()
                .and_then(AuthFailure::into_detail)
                .unwrap_or_default();
            debug!(status = %status, "Authentication rejected");
            return Err(ApiError::auth(detail));
        }

        let auth: AuthResponse = serde_json::from_str(&text)
            .map_err(|_| ApiError::auth("Malformed authentication response"))?;
        Credential::new(auth.token).ok_or_else(|| ApiError::auth("Server returned an empty token"))
    }

    /// Fetch the profile of the user the credential belongs to
    pub async fn fetch_profile(&self, credential: &Credential) -> Result<UserIdentity, ApiError> {
        self.get(credential, &self.url(PROFILE_PATH)).await
    }

    // ===== Projects =====

    /// Projects on the first page, in server order
    pub async fn list_projects(&self, credential: &Credential) -> Result<Vec<Project>, ApiError> {
        let page: ProjectPage = self.get(credential, &self.url(PROJECTS_PATH)).await?;
        Ok(page.results)
    }

    /// A single page of projects including the pagination links
    pub async fn list_projects_page(
        &self,
        credential: &Credential,
        page: u32,
    ) -> Result<ProjectPage, ApiError> {
        let url = format!("{}?page={}", self.url(PROJECTS_PATH), page);
        self.get(credential, &url).await
    }

    /// Every project, following `next` links.
    ///
    /// Links pointing away from the configured base URL are not followed, so
    /// the credential is never sent to another host.
    pub async fn list_all_projects(
        &self,
        credential: &Credential,
    ) -> Result<Vec<Project>, ApiError> {
        let mut projects = Vec::new();
        let mut url = self.url(PROJECTS_PATH);

        for _ in 0..MAX_PAGES {
            let page: ProjectPage = self.get(credential, &url).await?;
            projects.extend(page.results);

            match page.next {
                Some(next) if self.is_same_origin(&next) => url = next,
                Some(next) => {
                    warn!(next = %next, "Not following pagination link to another host");
                    return Ok(projects);
                }
                None => return Ok(projects),
            }
        }

        warn!(pages = MAX_PAGES, "Stopped following project pages");
        Ok(projects)
    }

    pub async fn get_project(&self, credential: &Credential, id: i64) -> Result<Project, ApiError> {
        self.get(credential, &self.project_url(id)).await
    }

    /// Create a project; the returned record carries the server-assigned id and owner
    pub async fn create_project(
        &self,
        credential: &Credential,
        project: &NewProject,
    ) -> Result<Project, ApiError> {
        self.post(credential, &self.url(PROJECTS_PATH), project).await
    }

    /// Delete a project. `None` for 204 or an empty body, otherwise the JSON the server sent.
    pub async fn delete_project(
        &self,
        credential: &Credential,
        id: i64,
    ) -> Result<Option<Value>, ApiError> {
        let url = self.project_url(id);
        debug!(url = %url, "DELETE");

        let response = self.request(Method::DELETE, &url, Some(credential)).send().await?;
        let response = Self::check_response(response).await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| ApiError::decode(url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new("http://localhost:8000/").expect("client");
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url(PROJECTS_PATH), "http://localhost:8000/taskmanager/projects/");
    }

    #[test]
    fn test_project_url() {
        let client = ApiClient::new(DEFAULT_BASE_URL).expect("client");
        assert_eq!(
            client.project_url(42),
            "https://sandbox.academiadevelopers.com/taskmanager/projects/42/"
        );
    }

    #[test]
    fn test_is_same_origin() {
        let client = ApiClient::new("http://127.0.0.1:1234").expect("client");
        assert!(client.is_same_origin("http://127.0.0.1:1234/taskmanager/projects/?page=2"));
        assert!(!client.is_same_origin("http://127.0.0.1:12345/taskmanager/projects/?page=2"));
        assert!(!client.is_same_origin("https://elsewhere.example.com/taskmanager/projects/"));
    }

    #[test]
    fn test_auth_failure_detail() {
        let failure: AuthFailure =
            serde_json::from_str(r#"{"detail":"Invalid token."}"#).expect("parse");
        assert_eq!(failure.into_detail().as_deref(), Some("Invalid token."));

        let failure: AuthFailure = serde_json::from_str(
            r#"{"non_field_errors":["Unable to log in with provided credentials."]}"#,
        )
        .expect("parse");
        assert_eq!(
            failure.into_detail().as_deref(),
            Some("Unable to log in with provided credentials.")
        );

        let failure: AuthFailure = serde_json::from_str("{}").expect("parse");
        assert!(failure.into_detail().is_none());
    }
}
