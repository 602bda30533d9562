//! The signed-in session, persisted between invocations.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context};
use storybook::Session;
use tracing::debug;

use crate::config::app_dir;

pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config_dir>/storybook/session.json`.
    pub fn default_location() -> anyhow::Result<Self> {
        let dir = app_dir().ok_or_else(|| anyhow!("no configuration directory on this platform"))?;
        Ok(Self::new(dir.join("session.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored session, or `None` when signed out.
    pub fn load(&self) -> anyhow::Result<Option<Session>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };
        let session = serde_json::from_str(&text)
            .with_context(|| format!("{} is not a valid session file", self.path.display()))?;
        Ok(Some(session))
    }

    pub fn save(&self, session: &Session) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, json).with_context(|| format!("writing {}", self.path.display()))?;
        restrict_permissions(&self.path)?;
        debug!(path = %self.path.display(), "saved session");
        Ok(())
    }

    /// Forgets the session. Clearing an absent session succeeds.
    pub fn clear(&self) -> anyhow::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", self.path.display())),
        }
    }
}

/// The file holds a refresh token; keep it private to the user.
#[cfg(unix)]
fn restrict_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("restricting permissions of {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use storybook::{AuthUser, Email, Timestamp, UserId};

    use super::*;

    fn store(name: &str) -> SessionStore {
        let dir = std::env::temp_dir().join(format!("storybook-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        SessionStore::new(dir.join("nested").join("session.json"))
    }

    fn session() -> Session {
        Session {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            expires_at: Timestamp::from_unix(1_900_000_000).unwrap(),
            user: AuthUser {
                id: UserId::new_random(),
                email: Email::new("mei@example.com"),
            },
        }
    }

    #[test]
    fn saved_sessions_load_back() {
        let store = store("roundtrip");
        let session = session();
        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), Some(session));
    }

    #[test]
    fn missing_file_means_signed_out() {
        let store = store("missing");
        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();
    }

    #[test]
    fn clear_removes_the_session() {
        let store = store("clear");
        store.save(&session()).unwrap();
        store.clear().unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn corrupt_files_are_reported() {
        let store = store("corrupt");
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn session_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let store = store("perms");
        store.save(&session()).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
