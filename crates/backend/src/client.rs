//! Shared HTTP plumbing: configuration, headers, and status mapping.

use std::{fmt::Display, sync::Arc, time::Duration};

use reqwest::{Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use storybook::{Session, StoreError};

/// Storage bucket used when the configuration does not name one.
pub const DEFAULT_BUCKET: &str = "storybooks";

/// Connection settings for the hosted backend.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Project URL, e.g. `https://abcd.supabase.co`.
    pub url: String,
    /// Public anonymous key; row-level security does the rest.
    pub anon_key: String,
    pub bucket: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            bucket: DEFAULT_BUCKET.into(),
            timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url)
            .field("anon_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Anonymous client. Implements [`storybook::AuthProvider`]; use
/// [`SupabaseClient::authorized`] for data access on behalf of a user.
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    pub(crate) http: reqwest::Client,
    pub(crate) config: Arc<BackendConfig>,
}

impl SupabaseClient {
    pub fn new(config: BackendConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// A client acting with the session's access token.
    pub fn authorized(&self, session: &Session) -> AuthorizedClient {
        AuthorizedClient {
            inner: self.clone(),
            access_token: session.access_token.clone(),
        }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), path)
    }

    /// Request with the `apikey` header and a bearer token (anon key when
    /// `bearer` is `None`).
    pub(crate) fn request(&self, method: Method, path: &str, bearer: Option<&str>) -> RequestBuilder {
        let token = bearer.unwrap_or(&self.config.anon_key);
        self.http
            .request(method, self.url(path))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token)
    }
}

/// Client acting on behalf of a signed-in user. Implements
/// [`storybook::BookRepository`], [`storybook::ProfileRepository`], and
/// [`storybook::ObjectStore`].
#[derive(Debug, Clone)]
pub struct AuthorizedClient {
    pub(crate) inner: SupabaseClient,
    pub(crate) access_token: String,
}

impl AuthorizedClient {
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.inner.request(method, path, Some(&self.access_token))
    }
}

// ---------------------------------------------------------------------------
// Sending and status mapping
// ---------------------------------------------------------------------------

/// Sends `request` and maps transport failures and non-success statuses.
///
/// `entity` and `id` only label a resulting [`StoreError::NotFound`].
pub(crate) async fn send(
    request: RequestBuilder,
    entity: &'static str,
    id: impl Display,
) -> Result<Response, StoreError> {
    let response = request
        .send()
        .await
        .map_err(|e| StoreError::Transport(e.to_string()))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let err = error_for_status(status.as_u16(), &body, entity, &id.to_string());
    tracing::debug!(status = status.as_u16(), error = %err, "Backend request failed");
    Err(err)
}

/// Decodes a JSON body, mapping failures to [`StoreError::Decode`].
pub(crate) async fn json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    response
        .json()
        .await
        .map_err(|e| StoreError::Decode(e.to_string()))
}

/// Error bodies differ per service: GoTrue uses `msg` or `error_description`,
/// PostgREST and Storage use `message`. Storage nests its real status in
/// `statusCode`.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default, rename = "statusCode")]
    status_code: Option<serde_json::Value>,
}

impl ErrorBody {
    fn message(&self) -> Option<String> {
        self.error_description
            .clone()
            .or_else(|| self.msg.clone())
            .or_else(|| self.message.clone())
            .or_else(|| self.error.as_ref().and_then(|e| e.as_str()).map(str::to_string))
    }

    fn nested_status(&self) -> Option<u16> {
        match self.status_code.as_ref()? {
            serde_json::Value::String(s) => s.parse().ok(),
            serde_json::Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            _ => None,
        }
    }
}

pub(crate) fn error_for_status(status: u16, body: &str, entity: &'static str, id: &str) -> StoreError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message()
        .unwrap_or_else(|| body.trim().chars().take(300).collect());
    let status = parsed.nested_status().unwrap_or(status);

    match status {
        401 => StoreError::Unauthorized(message),
        403 => StoreError::Forbidden(message),
        404 => StoreError::NotFound {
            entity,
            id: id.to_string(),
        },
        409 => StoreError::Conflict(message),
        _ => StoreError::Provider { status, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gotrue_error_description_is_preferred() {
        let body = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        assert_eq!(
            error_for_status(400, body, "session", ""),
            StoreError::Provider {
                status: 400,
                message: "Invalid login credentials".into()
            }
        );
    }

    #[test]
    fn storage_nested_status_overrides_http_status() {
        let body = r#"{"statusCode":"404","error":"not_found","message":"Object not found"}"#;
        assert_eq!(
            error_for_status(400, body, "object", "a/b.png"),
            StoreError::NotFound {
                entity: "object",
                id: "a/b.png".into()
            }
        );
    }

    #[test]
    fn auth_and_conflict_statuses_map_to_variants() {
        assert!(matches!(
            error_for_status(401, r#"{"msg":"JWT expired"}"#, "book", "x"),
            StoreError::Unauthorized(m) if m == "JWT expired"
        ));
        assert!(matches!(
            error_for_status(403, r#"{"message":"new row violates row-level security policy"}"#, "book", "x"),
            StoreError::Forbidden(_)
        ));
        assert!(matches!(
            error_for_status(409, r#"{"code":"23505","message":"duplicate key"}"#, "book", "x"),
            StoreError::Conflict(m) if m == "duplicate key"
        ));
    }

    #[test]
    fn non_json_bodies_become_the_message() {
        assert_eq!(
            error_for_status(502, "upstream down\n", "book", "x"),
            StoreError::Provider {
                status: 502,
                message: "upstream down".into()
            }
        );
    }

    #[test]
    fn urls_do_not_double_slashes() {
        let client = SupabaseClient::new(BackendConfig {
            url: "https://proj.supabase.co/".into(),
            anon_key: "anon".into(),
            ..BackendConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.url("/rest/v1/books"),
            "https://proj.supabase.co/rest/v1/books"
        );
    }
}
