//! REST client for the plant-log backend.
//!
//! Thin reqwest wrapper: one method per endpoint, bearer auth passed in by
//! the caller. Status/body interpretation lives in pure helpers so it can be
//! tested without a server.
//!
//! ERROR HANDLING
//! ==============
//! Non-2xx responses become [`ApiError::Status`] with FastAPI's `detail`
//! message when present. The session manager only cares whether a failure
//! is a 401 ([`ApiError::is_unauthorized`]) or something else.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::types::{NewUsuario, RoleSummary, TokenResponse, User, Usuario, UsuarioUpdate};
use crate::config::{ClientConfig, HttpTimeouts};
use crate::records::{FormKind, RecordFilter};

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response (connect, DNS, TLS, reset).
    #[error("request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {detail}")]
    Status { status: u16, detail: String },

    /// The response body could not be decoded.
    #[error("response decode failed: {0}")]
    Decode(String),

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The request was rejected locally before being sent.
    #[error("invalid request: {0}")]
    Validation(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Whether a credential exchange was refused (as opposed to failing).
    #[must_use]
    pub fn is_credential_rejection(&self) -> bool {
        matches!(self.status(), Some(400 | 401 | 403))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Request(error.to_string())
        }
    }
}

// =============================================================================
// AUTH BACKEND SEAM
// =============================================================================

/// The two backend calls the session manager depends on.
#[async_trait::async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange username and password for a bearer token.
    async fn request_token(&self, username: &str, password: &str) -> Result<TokenResponse, ApiError>;

    /// Fetch the canonical profile of the token's owner.
    async fn fetch_current_user(&self, token: &str) -> Result<User, ApiError>;
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client for `base_url` (no trailing slash).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn new(base_url: impl Into<String>, timeouts: HttpTimeouts) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.into().trim_end_matches('/').to_owned() })
    }

    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::new(config.api_url.clone(), config.http)
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL of a profile photo path served by the backend.
    #[must_use]
    pub fn asset_url(&self, path: &str) -> String {
        self.url(path)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        self.http.request(method, self.url(path)).bearer_auth(token)
    }

    // -------------------------------------------------------------------------
    // users
    // -------------------------------------------------------------------------

    /// `GET /api/usuarios/`, optionally filtered by active flag and role category.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-2xx status.
    pub async fn list_users(
        &self,
        token: &str,
        activo: Option<bool>,
        rol: Option<&str>,
    ) -> Result<Vec<Usuario>, ApiError> {
        let query = user_list_query(activo, rol);
        let request = self.authed(Method::GET, "/api/usuarios/", token).query(&query);
        read_json(request.send().await?).await
    }

    /// # Errors
    ///
    /// Returns an error on transport failure or a non-2xx status.
    pub async fn get_user(&self, token: &str, id: i64) -> Result<Usuario, ApiError> {
        let request = self.authed(Method::GET, &user_path(id), token);
        read_json(request.send().await?).await
    }

    /// # Errors
    ///
    /// Returns an error on transport failure or a non-2xx status.
    pub async fn create_user(&self, token: &str, usuario: &NewUsuario) -> Result<Usuario, ApiError> {
        let request = self.authed(Method::POST, "/api/usuarios/", token).json(usuario);
        read_json(request.send().await?).await
    }

    /// `PUT /api/usuarios/{id}` as a multipart form.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] for an update with no fields, or an
    /// error on transport failure / non-2xx status.
    pub async fn update_user(&self, token: &str, id: i64, update: &UsuarioUpdate) -> Result<Usuario, ApiError> {
        let fields = update.form_fields();
        if fields.is_empty() {
            return Err(ApiError::Validation("update has no fields".to_owned()));
        }
        let form = fields
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value));
        let request = self.authed(Method::PUT, &user_path(id), token).multipart(form);
        read_json(request.send().await?).await
    }

    /// Update the signed-in user's own name, email and optional photo.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-2xx status.
    pub async fn update_profile(
        &self,
        token: &str,
        id: i64,
        nombre: &str,
        email: &str,
        photo: Option<(String, Vec<u8>)>,
    ) -> Result<Usuario, ApiError> {
        let mut form = Form::new()
            .text("nombre", nombre.to_owned())
            .text("email", email.to_owned());
        if let Some((file_name, bytes)) = photo {
            form = form.part("foto_perfil", Part::bytes(bytes).file_name(file_name));
        }
        let request = self.authed(Method::PUT, &user_path(id), token).multipart(form);
        read_json(request.send().await?).await
    }

    /// # Errors
    ///
    /// Returns an error on transport failure or a non-2xx status.
    pub async fn delete_user(&self, token: &str, id: i64) -> Result<(), ApiError> {
        let request = self.authed(Method::DELETE, &user_path(id), token);
        ensure_success(request.send().await?).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error on transport failure or a non-2xx status.
    pub async fn activate_user(&self, token: &str, id: i64) -> Result<Usuario, ApiError> {
        let path = format!("{}/activar", user_path(id));
        let request = self
            .authed(Method::POST, &path, token)
            .json(&Value::Object(Map::new()));
        read_json(request.send().await?).await
    }

    /// # Errors
    ///
    /// Returns an error on transport failure or a non-2xx status.
    pub async fn list_roles(&self, token: &str, active_only: bool) -> Result<Vec<RoleSummary>, ApiError> {
        let mut request = self.authed(Method::GET, "/api/roles/", token);
        if active_only {
            request = request.query(&[("activo", "true")]);
        }
        read_json(request.send().await?).await
    }

    // -------------------------------------------------------------------------
    // records
    // -------------------------------------------------------------------------

    /// POST one prepared form payload.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-2xx status.
    pub async fn submit_record(
        &self,
        token: &str,
        kind: FormKind,
        payload: &Map<String, Value>,
    ) -> Result<Value, ApiError> {
        let request = self
            .authed(Method::POST, &kind.collection_path(), token)
            .json(payload);
        read_json(request.send().await?).await
    }

    /// # Errors
    ///
    /// Returns an error on transport failure or a non-2xx status.
    pub async fn list_records(
        &self,
        token: &str,
        kind: FormKind,
        filter: &RecordFilter,
    ) -> Result<Vec<Value>, ApiError> {
        let request = self
            .authed(Method::GET, &kind.collection_path(), token)
            .query(&filter.query_pairs());
        read_json(request.send().await?).await
    }

    /// Download the spreadsheet export for `period`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] for a form without exports or a
    /// malformed period, or an error on transport failure / non-2xx status.
    pub async fn export_excel(&self, token: &str, kind: FormKind, period: &str) -> Result<Vec<u8>, ApiError> {
        let path = kind
            .export_path(period)
            .map_err(|e| ApiError::Validation(e.to_string()))?;
        let response = ensure_success(self.authed(Method::GET, &path, token).send().await?).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait::async_trait]
impl AuthBackend for ApiClient {
    async fn request_token(&self, username: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let form = Form::new()
            .text("username", username.to_owned())
            .text("password", password.to_owned());
        let response = self
            .http
            .post(self.url("/api/auth/token"))
            .multipart(form)
            .send()
            .await?;
        read_json(response).await
    }

    async fn fetch_current_user(&self, token: &str) -> Result<User, ApiError> {
        let response = self.authed(Method::GET, "/api/auth/me", token).send().await?;
        read_json(response).await
    }
}

// =============================================================================
// RESPONSE HANDLING
// =============================================================================

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let response = ensure_success(response).await?;
    let text = response.text().await?;
    parse_body(&text)
}

fn parse_body<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    serde_json::from_str(text).map_err(|e| ApiError::Decode(e.to_string()))
}

fn status_error(status: StatusCode, body: &str) -> ApiError {
    let detail = error_detail(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_owned()
    });
    ApiError::Status { status: status.as_u16(), detail }
}

/// Extract FastAPI's `detail`: either a string, or a list of validation
/// entries whose `msg` fields are joined.
fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(detail) => Some(detail.clone()),
        Value::Array(entries) => {
            let messages: Vec<&str> = entries
                .iter()
                .filter_map(|entry| entry.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}

fn user_path(id: i64) -> String {
    format!("/api/usuarios/{id}")
}

fn user_list_query(activo: Option<bool>, rol: Option<&str>) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(activo) = activo {
        query.push(("activo", activo.to_string()));
    }
    if let Some(rol) = rol.filter(|r| !r.is_empty()) {
        query.push(("rol", rol.to_owned()));
    }
    query
}

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;
