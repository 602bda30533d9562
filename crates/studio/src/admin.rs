//! Admin-only user directory.

use std::sync::Arc;

use storybook::{AuthUser, Profile, ProfileRepository, StorybookError};
use tracing::instrument;

pub struct AdminDirectory {
    profiles: Arc<dyn ProfileRepository>,
}

impl AdminDirectory {
    pub fn new(profiles: Arc<dyn ProfileRepository>) -> Self {
        Self { profiles }
    }

    /// Every registered profile, oldest first.
    ///
    /// The actor's role is read from the backend rather than trusted from the
    /// caller, so a stale local profile cannot grant access.
    #[instrument(skip_all, fields(actor = %actor.id))]
    pub async fn list_users(&self, actor: &AuthUser) -> Result<Vec<Profile>, StorybookError> {
        let is_admin = self
            .profiles
            .get_profile(actor.id)
            .await?
            .is_some_and(|p| p.is_admin());
        if !is_admin {
            return Err(StorybookError::Forbidden {
                reason: "only admins can list users".into(),
            });
        }
        Ok(self.profiles.list_profiles().await?)
    }
}
