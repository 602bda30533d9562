//! Sign-in lifecycle and profile settings.

use std::sync::Arc;

use storybook::{
    AuthProvider, AuthUser, BrandSettings, Credentials, Email, HexColor, ObjectStore, Profile,
    ProfileRepository, Session, SignUpOutcome, StorageKey, StorybookError, Timestamp,
    MAX_FIELD_LEN,
};
use tracing::{info, instrument, warn};

/// Largest accepted brand logo.
pub const MAX_LOGO_BYTES: usize = 2 * 1024 * 1024;

/// Wraps the auth port with session refresh.
pub struct AccountService {
    auth: Arc<dyn AuthProvider>,
}

impl AccountService {
    pub fn new(auth: Arc<dyn AuthProvider>) -> Self {
        Self { auth }
    }

    #[instrument(skip_all, fields(email = %credentials.email))]
    pub async fn sign_up(
        &self,
        credentials: &Credentials,
    ) -> Result<SignUpOutcome, StorybookError> {
        let outcome = self.auth.sign_up(credentials).await?;
        if let SignUpOutcome::ConfirmationRequired { .. } = &outcome {
            info!("sign-up needs e-mail confirmation before first sign-in");
        }
        Ok(outcome)
    }

    #[instrument(skip_all, fields(email = %credentials.email))]
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session, StorybookError> {
        Ok(self.auth.sign_in(credentials).await?)
    }

    pub async fn sign_out(&self, session: &Session) -> Result<(), StorybookError> {
        Ok(self.auth.sign_out(session).await?)
    }

    pub async fn request_password_reset(&self, email: &Email) -> Result<(), StorybookError> {
        Ok(self.auth.request_password_reset(email).await?)
    }

    /// Returns `session` unchanged while it is valid, otherwise a refreshed one.
    ///
    /// A rejected refresh means the user must sign in again.
    #[instrument(skip_all, fields(user = %session.user.id))]
    pub async fn ensure_fresh(&self, session: Session) -> Result<Session, StorybookError> {
        if !session.is_expired(Timestamp::now()) {
            return Ok(session);
        }
        match self.auth.refresh(&session).await {
            Ok(fresh) => {
                info!(expires_at = %fresh.expires_at, "refreshed session");
                Ok(fresh)
            }
            Err(error) if !error.retry_policy().is_retryable() => {
                warn!(%error, "session refresh rejected");
                Err(StorybookError::NotSignedIn)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// The user the backend associates with `session`.
    pub async fn current_user(&self, session: &Session) -> Result<AuthUser, StorybookError> {
        Ok(self.auth.current_user(session).await?)
    }
}

/// Changes to apply to a profile's brand settings. `None` leaves a field as
/// it is; `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct BrandUpdate {
    pub brand_name: Option<Option<String>>,
    pub primary_color: Option<Option<HexColor>>,
}

impl BrandUpdate {
    fn apply(self, brand: &mut BrandSettings) -> Result<(), StorybookError> {
        if let Some(name) = self.brand_name {
            brand.brand_name = clean_optional("brand_name", name)?;
        }
        if let Some(color) = self.primary_color {
            brand.primary_color = color;
        }
        Ok(())
    }
}

fn clean_optional(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<String>, StorybookError> {
    let Some(value) = value else { return Ok(None) };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_FIELD_LEN {
        return Err(StorybookError::InvalidParameters {
            field,
            reason: format!("must be at most {MAX_FIELD_LEN} characters"),
        });
    }
    Ok(Some(trimmed.to_string()))
}

/// Image type of a logo, from its leading bytes.
fn logo_type(bytes: &[u8]) -> Option<(&'static str, &'static str)> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some(("png", "image/png"))
    } else if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
        Some(("jpg", "image/jpeg"))
    } else {
        None
    }
}

/// Profile rows and brand assets of signed-in users.
pub struct ProfileService {
    profiles: Arc<dyn ProfileRepository>,
    storage: Arc<dyn ObjectStore>,
}

impl ProfileService {
    pub fn new(profiles: Arc<dyn ProfileRepository>, storage: Arc<dyn ObjectStore>) -> Self {
        Self { profiles, storage }
    }

    /// Loads the user's profile, creating it on first sign-in.
    #[instrument(skip_all, fields(user = %user.id))]
    pub async fn load_or_create(&self, user: &AuthUser) -> Result<Profile, StorybookError> {
        if let Some(profile) = self.profiles.get_profile(user.id).await? {
            return Ok(profile);
        }
        info!("creating profile on first sign-in");
        Ok(self
            .profiles
            .upsert_profile(&Profile::first_sign_in(user))
            .await?)
    }

    pub async fn update_display_name(
        &self,
        user: &AuthUser,
        display_name: Option<String>,
    ) -> Result<Profile, StorybookError> {
        let mut profile = self.load_or_create(user).await?;
        profile.display_name = clean_optional("display_name", display_name)?;
        Ok(self.profiles.upsert_profile(&profile).await?)
    }

    pub async fn update_brand(
        &self,
        user: &AuthUser,
        update: BrandUpdate,
    ) -> Result<Profile, StorybookError> {
        let mut profile = self.load_or_create(user).await?;
        update.apply(&mut profile.brand)?;
        Ok(self.profiles.upsert_profile(&profile).await?)
    }

    /// Stores a PNG or JPEG logo and points the brand settings at it.
    #[instrument(skip_all, fields(user = %user.id, size = bytes.len()))]
    pub async fn upload_logo(
        &self,
        user: &AuthUser,
        bytes: Vec<u8>,
    ) -> Result<Profile, StorybookError> {
        let (extension, content_type) =
            logo_type(&bytes).ok_or_else(|| StorybookError::InvalidParameters {
                field: "logo",
                reason: "must be a PNG or JPEG image".into(),
            })?;
        if bytes.len() > MAX_LOGO_BYTES {
            return Err(StorybookError::InvalidParameters {
                field: "logo",
                reason: format!("must be at most {MAX_LOGO_BYTES} bytes"),
            });
        }

        let mut profile = self.load_or_create(user).await?;
        let key = StorageKey::for_logo(user.id, extension);
        self.storage.upload(&key, bytes, content_type).await?;

        let previous = profile.brand.logo.replace(key.clone());
        let saved = self.profiles.upsert_profile(&profile).await?;
        if let Some(old) = previous.filter(|old| *old != key) {
            if let Err(error) = self.storage.remove(&[old]).await {
                warn!(%error, "could not remove previous logo");
            }
        }
        Ok(saved)
    }

    /// Public URL of the user's logo, if one is set.
    pub fn logo_url(&self, profile: &Profile) -> Option<String> {
        profile.brand.logo.as_ref().map(|key| self.storage.public_url(key))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use storybook::{Role, StoreError};

    use super::*;
    use crate::testing::{session_for, user, FakeBackend};

    fn png_bytes() -> Vec<u8> {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend_from_slice(&[0; 16]);
        bytes
    }

    #[tokio::test]
    async fn valid_sessions_are_not_refreshed() {
        let backend = Arc::new(FakeBackend::default());
        let accounts = AccountService::new(backend.clone());
        let session = session_for(&user(), Timestamp::now().plus_seconds(3600));

        let same = accounts.ensure_fresh(session.clone()).await.unwrap();
        assert_eq!(same, session);
        assert_eq!(backend.refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn expired_sessions_are_refreshed() {
        let backend = Arc::new(FakeBackend::default());
        let accounts = AccountService::new(backend.clone());
        let session = session_for(&user(), Timestamp::now().plus_seconds(-10));

        let fresh = accounts.ensure_fresh(session).await.unwrap();
        assert_eq!(fresh.access_token, "access-renewed");
        assert!(!fresh.is_expired(Timestamp::now()));
    }

    #[tokio::test]
    async fn revoked_refresh_token_means_signed_out() {
        let backend = Arc::new(FakeBackend::default());
        backend.fail(|f| f.refresh = true);
        let accounts = AccountService::new(backend.clone());
        let session = session_for(&user(), Timestamp::now().plus_seconds(-10));

        let err = accounts.ensure_fresh(session).await.unwrap_err();
        assert!(matches!(err, StorybookError::NotSignedIn));
    }

    #[tokio::test]
    async fn wrong_password_surfaces_as_unauthorized() {
        let backend = Arc::new(FakeBackend::default());
        let accounts = AccountService::new(backend);
        let credentials =
            Credentials::new(Email::new("mei@example.com").unwrap(), "wrong password").unwrap();

        let err = accounts.sign_in(&credentials).await.unwrap_err();
        assert!(matches!(err, StorybookError::Store(StoreError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn first_sign_in_creates_a_member_profile_once() {
        let backend = Arc::new(FakeBackend::default());
        let profiles = ProfileService::new(backend.clone(), backend.clone());
        let user = user();

        let created = profiles.load_or_create(&user).await.unwrap();
        let loaded = profiles.load_or_create(&user).await.unwrap();

        assert_eq!(created.role, Role::Member);
        assert_eq!(created, loaded);
        assert_eq!(backend.profiles.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn brand_updates_touch_only_the_given_fields() {
        let backend = Arc::new(FakeBackend::default());
        let profiles = ProfileService::new(backend.clone(), backend.clone());
        let user = user();

        profiles
            .update_brand(
                &user,
                BrandUpdate {
                    brand_name: Some(Some(" Moonbeam Press ".into())),
                    primary_color: Some(HexColor::parse("#336699")),
                },
            )
            .await
            .unwrap();
        let profile = profiles
            .update_brand(
                &user,
                BrandUpdate {
                    brand_name: None,
                    primary_color: Some(None),
                },
            )
            .await
            .unwrap();

        assert_eq!(profile.brand.brand_name.as_deref(), Some("Moonbeam Press"));
        assert_eq!(profile.brand.primary_color, None);
    }

    #[tokio::test]
    async fn blank_display_name_clears_it() {
        let backend = Arc::new(FakeBackend::default());
        let profiles = ProfileService::new(backend.clone(), backend.clone());
        let user = user();

        let named = profiles
            .update_display_name(&user, Some("Mei".into()))
            .await
            .unwrap();
        assert_eq!(named.label(), "Mei");
        let cleared = profiles
            .update_display_name(&user, Some("   ".into()))
            .await
            .unwrap();
        assert_eq!(cleared.display_name, None);
    }

    #[tokio::test]
    async fn logo_upload_stores_the_image_and_links_it() {
        let backend = Arc::new(FakeBackend::default());
        let profiles = ProfileService::new(backend.clone(), backend.clone());
        let user = user();

        let profile = profiles.upload_logo(&user, png_bytes()).await.unwrap();

        let key = profile.brand.logo.clone().unwrap();
        assert_eq!(key.as_str(), format!("{}/brand/logo.png", user.id));
        assert_eq!(backend.objects.lock().unwrap()[key.as_str()].1, "image/png");
        assert_eq!(
            profiles.logo_url(&profile).unwrap(),
            format!("https://cdn.test/{key}")
        );
    }

    #[tokio::test]
    async fn replacing_a_png_logo_with_a_jpeg_removes_the_old_object() {
        let backend = Arc::new(FakeBackend::default());
        let profiles = ProfileService::new(backend.clone(), backend.clone());
        let user = user();

        profiles.upload_logo(&user, png_bytes()).await.unwrap();
        profiles
            .upload_logo(&user, vec![0xff, 0xd8, 0xff, 0xe0, 0, 0])
            .await
            .unwrap();

        assert_eq!(
            backend.object_keys(),
            vec![format!("{}/brand/logo.jpg", user.id)]
        );
    }

    #[tokio::test]
    async fn oversized_logos_are_rejected_and_the_old_one_is_kept() {
        let backend = Arc::new(FakeBackend::default());
        let profiles = ProfileService::new(backend.clone(), backend.clone());
        let user = user();
        let original = profiles.upload_logo(&user, png_bytes()).await.unwrap();

        let mut oversized = png_bytes();
        oversized.resize(MAX_LOGO_BYTES + 1, 0);
        let err = profiles.upload_logo(&user, oversized).await.unwrap_err();

        assert!(matches!(err, StorybookError::InvalidParameters { field: "logo", .. }));
        let logo = original.brand.logo.unwrap();
        assert_eq!(backend.object_keys(), vec![logo.to_string()]);
        assert_eq!(backend.objects.lock().unwrap()[logo.as_str()].0, png_bytes());
        let stored = profiles.load_or_create(&user).await.unwrap();
        assert_eq!(stored.brand.logo, Some(logo));
    }

    #[tokio::test]
    async fn rejected_profile_save_keeps_the_previous_logo_object() {
        let backend = Arc::new(FakeBackend::default());
        let profiles = ProfileService::new(backend.clone(), backend.clone());
        let user = user();
        profiles.upload_logo(&user, png_bytes()).await.unwrap();
        backend.fail(|f| f.upsert_profile = true);

        let err = profiles
            .upload_logo(&user, vec![0xff, 0xd8, 0xff, 0xe0, 0, 0])
            .await
            .unwrap_err();

        assert!(matches!(err, StorybookError::Store(_)));
        let stored = profiles.load_or_create(&user).await.unwrap();
        let logo = stored.brand.logo.unwrap();
        assert_eq!(logo.as_str(), format!("{}/brand/logo.png", user.id));
        assert!(backend.object_keys().contains(&logo.to_string()));
    }

    #[tokio::test]
    async fn sign_out_hands_the_session_to_the_auth_service() {
        let backend = Arc::new(FakeBackend::default());
        let accounts = AccountService::new(backend.clone());
        let session = session_for(&user(), Timestamp::now().plus_seconds(3600));

        accounts.sign_out(&session).await.unwrap();
        assert_eq!(*backend.signed_out.lock().unwrap(), vec!["access".to_string()]);
    }

    #[tokio::test]
    async fn non_image_logos_are_rejected() {
        let backend = Arc::new(FakeBackend::default());
        let profiles = ProfileService::new(backend.clone(), backend.clone());

        let err = profiles
            .upload_logo(&user(), b"GIF89a".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, StorybookError::InvalidParameters { field: "logo", .. }));
        assert!(backend.object_keys().is_empty());
    }
}
