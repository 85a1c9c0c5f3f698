//! Local login gate
//!
//! Keeps a session token, its expiry and the user's display info in a JSON
//! file in the user state directory. This is a client-side convenience gate:
//! the file can be edited by anyone who can read it and nothing server-side
//! checks the token. It is not a security boundary.

use crate::config::{UserEntry, state_dir};
use crate::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SESSION_FILE: &str = "session.json";

const TOKEN_PREFIX: &str = "brain-session";

/// Session length for `hours`, or `None` when it cannot be represented
pub fn session_lifetime(hours: u64) -> Option<chrono::TimeDelta> {
    i64::try_from(hours).ok().and_then(chrono::TimeDelta::try_hours)
}

/// Who is logged in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub logged_in_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserInfo,
}

/// On-disk layout; each key may be missing independently
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(rename = "brain-ui-session", default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    /// Epoch milliseconds
    #[serde(
        rename = "brain-ui-session-expiry",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    expiry: Option<i64>,
    #[serde(rename = "brain-ui-user-info", default, skip_serializing_if = "Option::is_none")]
    user: Option<UserInfo>,
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
    lifetime_hours: u64,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>, lifetime_hours: u64) -> Self {
        Self {
            path: path.into(),
            lifetime_hours,
        }
    }

    /// Expiry of a session started at `now`
    fn expiry_after(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        session_lifetime(self.lifetime_hours)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                Error::Config(format!(
                    "auth.session_hours out of range: {}",
                    self.lifetime_hours
                ))
            })
    }

    /// Session file in the user state directory
    pub fn open_default(lifetime_hours: u64) -> Result<Self> {
        Ok(Self::new(state_dir()?.join(SESSION_FILE), lifetime_hours))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<SessionFile> {
        if !self.path.exists() {
            return Ok(SessionFile::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content) {
            Ok(file) => Ok(file),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable session file");
                Ok(SessionFile::default())
            }
        }
    }

    fn write(&self, file: &SessionFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(file)?)?;
        Ok(())
    }

    /// Check credentials against `users` and start a session
    pub fn login(
        &self,
        users: &[UserEntry],
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        let entry = users
            .iter()
            .find(|u| u.username == username && u.password == password)
            .ok_or(Error::InvalidCredentials)?;

        let expires_at = self.expiry_after(now)?;
        let random = uuid::Uuid::new_v4().simple().to_string();
        let session = Session {
            token: format!("{}-{}-{}", TOKEN_PREFIX, now.timestamp_millis(), &random[..9]),
            expires_at,
            user: UserInfo {
                username: entry.username.clone(),
                display_name: entry
                    .display_name
                    .clone()
                    .unwrap_or_else(|| entry.username.clone()),
                role: entry.role.clone().unwrap_or_else(|| "user".to_string()),
                logged_in_at: now,
            },
        };

        self.write(&SessionFile {
            token: Some(session.token.clone()),
            expiry: Some(session.expires_at.timestamp_millis()),
            user: Some(session.user.clone()),
        })?;
        tracing::info!(username, "logged in");
        Ok(session)
    }

    /// The live session, if any. An expired session is removed.
    pub fn current(&self, now: DateTime<Utc>) -> Result<Option<Session>> {
        let file = self.read()?;
        let (Some(token), Some(expiry), Some(user)) = (file.token, file.expiry, file.user) else {
            return Ok(None);
        };

        let Some(expires_at) = Utc.timestamp_millis_opt(expiry).single() else {
            self.logout()?;
            return Ok(None);
        };
        if now >= expires_at {
            tracing::info!(username = %user.username, "session expired");
            self.logout()?;
            return Ok(None);
        }

        Ok(Some(Session {
            token,
            expires_at,
            user,
        }))
    }

    /// Like [`current`](Self::current), but missing sessions are an error
    pub fn require(&self, now: DateTime<Utc>) -> Result<Session> {
        self.current(now)?.ok_or(Error::NoSession)
    }

    /// Remove every session key
    pub fn logout(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn users() -> Vec<UserEntry> {
        vec![UserEntry {
            username: "admin".to_string(),
            password: "brain".to_string(),
            display_name: Some("Admin System".to_string()),
            role: Some("admin".to_string()),
        }]
    }

    fn store(tmp: &TempDir) -> SessionStore {
        SessionStore::new(tmp.path().join("state").join(SESSION_FILE), 24)
    }

    #[test]
    fn test_login_persists_fixed_keys() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let now = Utc::now();

        let session = store.login(&users(), "admin", "brain", now).unwrap();
        assert!(session.token.starts_with("brain-session-"));
        assert_eq!(session.expires_at, now + chrono::Duration::hours(24));
        assert_eq!(session.user.display_name, "Admin System");

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["brain-ui-session"], session.token.as_str());
        assert_eq!(
            raw["brain-ui-session-expiry"],
            session.expires_at.timestamp_millis()
        );
        assert_eq!(raw["brain-ui-user-info"]["username"], "admin");

        let current = store.current(now).unwrap().unwrap();
        assert_eq!(current.token, session.token);
    }

    #[test]
    fn test_wrong_credentials() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let err = store
            .login(&users(), "admin", "wrong", Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials));
        assert!(matches!(
            store.login(&[], "admin", "brain", Utc::now()),
            Err(Error::InvalidCredentials)
        ));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_expired_session_is_cleared() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let now = Utc::now();
        store.login(&users(), "admin", "brain", now).unwrap();

        let later = now + chrono::Duration::hours(25);
        assert!(store.current(later).unwrap().is_none());
        assert!(!store.path().exists());
        assert!(matches!(store.require(later), Err(Error::NoSession)));
    }

    #[test]
    fn test_partial_file_is_no_session() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), r#"{"brain-ui-session": "brain-session-1-abc"}"#).unwrap();
        assert!(store.current(Utc::now()).unwrap().is_none());
    }

    #[test]
    fn test_oversized_lifetime_is_a_config_error() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path().join(SESSION_FILE), 10_000_000_000_000);
        let err = store
            .login(&users(), "admin", "brain", Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(!store.path().exists());

        let huge = SessionStore::new(tmp.path().join(SESSION_FILE), u64::MAX);
        assert!(matches!(
            huge.login(&users(), "admin", "brain", Utc::now()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_logout_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.login(&users(), "admin", "brain", Utc::now()).unwrap();
        store.logout().unwrap();
        store.logout().unwrap();
        assert!(store.current(Utc::now()).unwrap().is_none());
    }
}
