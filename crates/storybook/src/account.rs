//! Authentication sessions, profiles, and brand settings.

use serde::{Deserialize, Serialize};

use crate::{Email, HexColor, Role, StorageKey, StorybookError, Timestamp, UserId};

/// Minimum password length accepted by the auth service.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Seconds before the real expiry at which a session is treated as expired,
/// so that a request started just before expiry still carries a valid token.
const EXPIRY_SKEW_SECS: i64 = 60;

/// E-mail and password for sign-up and sign-in.
#[derive(Clone)]
pub struct Credentials {
    pub email: Email,
    password: String,
}

impl Credentials {
    /// Validates the password length; the address is validated by [`Email`].
    pub fn new(email: Email, password: impl Into<String>) -> Result<Self, StorybookError> {
        let password = password.into();
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(StorybookError::InvalidParameters {
                field: "password",
                reason: format!("must be at least {MIN_PASSWORD_LEN} characters"),
            });
        }
        Ok(Self { email, password })
    }

    /// The plain-text password, only to be placed in the auth request body.
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Identity of the signed-in user as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: Option<Email>,
}

/// A signed-in session. Persisted by the CLI between invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Timestamp,
    pub user: AuthUser,
}

impl Session {
    /// Returns `true` if the access token is expired or about to expire at `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now.plus_seconds(EXPIRY_SKEW_SECS) >= self.expires_at
    }
}

/// Result of a sign-up request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The account is active and signed in.
    SignedIn(Session),
    /// The auth service sent a confirmation e-mail; sign in after confirming.
    ConfirmationRequired { user: AuthUser },
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// Per-user branding applied to exported books.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandSettings {
    /// Shown on the title sheet and in every footer.
    pub brand_name: Option<String>,
    /// Accent colour for headings.
    pub primary_color: Option<HexColor>,
    /// Storage key of an uploaded logo image.
    pub logo: Option<StorageKey>,
}

/// A user's profile row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    pub email: Option<Email>,
    pub display_name: Option<String>,
    pub role: Role,
    pub brand: BrandSettings,
    pub created_at: Timestamp,
}

impl Profile {
    /// The profile created on a user's first sign-in.
    pub fn first_sign_in(user: &AuthUser) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            display_name: None,
            role: Role::Member,
            brand: BrandSettings::default(),
            created_at: Timestamp::now(),
        }
    }

    /// Returns `true` if this profile may use the admin user list.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Name to greet the user with: display name, else e-mail, else the id.
    pub fn label(&self) -> String {
        match (&self.display_name, &self.email) {
            (Some(name), _) if !name.trim().is_empty() => name.clone(),
            (_, Some(email)) => email.to_string(),
            _ => self.user_id.to_string(),
        }
    }
}
