//! [`AuthProvider`] over the hosted auth service (GoTrue).

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use storybook::{
    AuthProvider, AuthUser, Credentials, Email, Session, SignUpOutcome, StoreError, Timestamp,
    UserId,
};
use tracing::instrument;

use crate::client::{json, send, SupabaseClient};

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct RecoverRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserBody {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl TryFrom<UserBody> for AuthUser {
    type Error = StoreError;

    fn try_from(body: UserBody) -> Result<Self, Self::Error> {
        let id: UserId = body
            .id
            .parse()
            .map_err(|e| StoreError::Decode(format!("user id '{}': {e}", body.id)))?;
        Ok(AuthUser {
            id,
            email: body.email.and_then(Email::new),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenBody {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserBody,
}

impl TokenBody {
    /// Converts to a [`Session`], preferring the absolute `expires_at` and
    /// falling back to `now + expires_in`.
    pub(crate) fn into_session(self, now: Timestamp) -> Result<Session, StoreError> {
        let expires_at = self
            .expires_at
            .and_then(Timestamp::from_unix)
            .or_else(|| self.expires_in.map(|secs| now.plus_seconds(secs)))
            .ok_or_else(|| StoreError::Decode("token response has no expiry".into()))?;
        Ok(Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user.try_into()?,
        })
    }
}

/// Sign-up answers with a token body when e-mail confirmation is disabled and
/// with the bare user otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SignUpBody {
    Token(TokenBody),
    User(UserBody),
}

impl SignUpBody {
    pub(crate) fn into_outcome(self, now: Timestamp) -> Result<SignUpOutcome, StoreError> {
        match self {
            Self::Token(token) => Ok(SignUpOutcome::SignedIn(token.into_session(now)?)),
            Self::User(user) => Ok(SignUpOutcome::ConfirmationRequired {
                user: user.try_into()?,
            }),
        }
    }
}

#[async_trait]
impl AuthProvider for SupabaseClient {
    #[instrument(skip_all, fields(email = %credentials.email))]
    async fn sign_up(&self, credentials: &Credentials) -> Result<SignUpOutcome, StoreError> {
        let request = self
            .request(Method::POST, "/auth/v1/signup", None)
            .json(&PasswordGrant {
                email: credentials.email.as_str(),
                password: credentials.password(),
            });
        let response = send(request, "account", &credentials.email).await?;
        json::<SignUpBody>(response)
            .await?
            .into_outcome(Timestamp::now())
    }

    #[instrument(skip_all, fields(email = %credentials.email))]
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, StoreError> {
        let request = self
            .request(Method::POST, "/auth/v1/token", None)
            .query(&[("grant_type", "password")])
            .json(&PasswordGrant {
                email: credentials.email.as_str(),
                password: credentials.password(),
            });
        let response = send(request, "account", &credentials.email).await?;
        json::<TokenBody>(response)
            .await?
            .into_session(Timestamp::now())
    }

    #[instrument(skip_all, fields(user = %session.user.id))]
    async fn refresh(&self, session: &Session) -> Result<Session, StoreError> {
        let request = self
            .request(Method::POST, "/auth/v1/token", None)
            .query(&[("grant_type", "refresh_token")])
            .json(&RefreshGrant {
                refresh_token: &session.refresh_token,
            });
        let response = send(request, "session", session.user.id).await?;
        json::<TokenBody>(response)
            .await?
            .into_session(Timestamp::now())
    }

    #[instrument(skip_all, fields(user = %session.user.id))]
    async fn sign_out(&self, session: &Session) -> Result<(), StoreError> {
        let request = self.request(Method::POST, "/auth/v1/logout", Some(&session.access_token));
        logout_outcome(send(request, "session", session.user.id).await)
    }

    #[instrument(skip_all, fields(user = %session.user.id))]
    async fn current_user(&self, session: &Session) -> Result<AuthUser, StoreError> {
        let request = self.request(Method::GET, "/auth/v1/user", Some(&session.access_token));
        let response = send(request, "user", session.user.id).await?;
        json::<UserBody>(response).await?.try_into()
    }

    #[instrument(skip_all, fields(email = %email))]
    async fn request_password_reset(&self, email: &Email) -> Result<(), StoreError> {
        let request = self
            .request(Method::POST, "/auth/v1/recover", None)
            .json(&RecoverRequest {
                email: email.as_str(),
            });
        send(request, "account", email).await.map(|_| ())
    }
}

/// An already-expired token has nothing left to revoke, so the server
/// rejecting it still leaves the user signed out.
fn logout_outcome<T>(result: Result<T, StoreError>) -> Result<(), StoreError> {
    match result {
        Ok(_) | Err(StoreError::Unauthorized(_)) => Ok(()),
        Err(e) => Err(e),
    }
}
