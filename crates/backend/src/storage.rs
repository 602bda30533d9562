//! [`ObjectStore`] over the hosted storage API.

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use storybook::{ObjectStore, StorageKey, StoreError};
use tracing::instrument;

use crate::client::{send, AuthorizedClient};

#[derive(Serialize)]
struct RemoveRequest<'a> {
    prefixes: Vec<&'a str>,
}

impl AuthorizedClient {
    fn bucket(&self) -> &str {
        &self.inner.config.bucket
    }

    fn object_path(&self, key: &StorageKey) -> String {
        format!("/storage/v1/object/{}/{}", self.bucket(), key)
    }
}

#[async_trait]
impl ObjectStore for AuthorizedClient {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(
        &self,
        key: &StorageKey,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let request = self
            .request(Method::POST, &self.object_path(key))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes);
        send(request, "object", key).await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn download(&self, key: &StorageKey) -> Result<Vec<u8>, StoreError> {
        let path = format!("/storage/v1/object/authenticated/{}/{}", self.bucket(), key);
        let response = send(self.request(Method::GET, &path), "object", key).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    #[instrument(skip_all, fields(count = keys.len()))]
    async fn remove(&self, keys: &[StorageKey]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        let path = format!("/storage/v1/object/{}", self.bucket());
        let request = self.request(Method::DELETE, &path).json(&RemoveRequest {
            prefixes: keys.iter().map(StorageKey::as_str).collect(),
        });
        match send(request, "object", keys.len()).await {
            Ok(_) | Err(StoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn public_url(&self, key: &StorageKey) -> String {
        self.inner
            .url(&format!("/storage/v1/object/public/{}/{}", self.bucket(), key))
    }
}

#[cfg(test)]
mod tests {
    use storybook::{AuthUser, Session, Timestamp, UserId};

    use super::*;
    use crate::{BackendConfig, SupabaseClient};

    fn client() -> AuthorizedClient {
        let anon = SupabaseClient::new(BackendConfig {
            url: "https://proj.supabase.co".into(),
            anon_key: "anon".into(),
            bucket: "books".into(),
            timeout_secs: 5,
        })
        .unwrap();
        anon.authorized(&Session {
            access_token: "jwt".into(),
            refresh_token: "r".into(),
            expires_at: Timestamp::now().plus_seconds(3600),
            user: AuthUser {
                id: UserId::new_random(),
                email: None,
            },
        })
    }

    #[test]
    fn public_urls_point_at_the_public_bucket_path() {
        let key = StorageKey::new("u/b/page-01.png").unwrap();
        assert_eq!(
            client().public_url(&key),
            "https://proj.supabase.co/storage/v1/object/public/books/u/b/page-01.png"
        );
    }

    #[test]
    fn object_paths_include_the_bucket() {
        let key = StorageKey::new("u/brand/logo.png").unwrap();
        assert_eq!(
            client().object_path(&key),
            "/storage/v1/object/books/u/brand/logo.png"
        );
    }

    #[tokio::test]
    async fn removing_nothing_makes_no_request() {
        assert_eq!(client().remove(&[]).await, Ok(()));
    }
}
