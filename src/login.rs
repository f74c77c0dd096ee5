use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, create_dir_all};
use std::path::Path;
use std::sync::RwLock;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

const DEFAULT_USERNAME: &str = "admin";
const DEFAULT_PASSWORD: &str = "admin123";

/// Stored account of an operator allowed to log in
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserRecord {
    pub email: String,

    /// Display name shown after login
    pub name: String,

    /// Argon2 hash of the user's password
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Credentials {
    pub usernames: BTreeMap<String, UserRecord>,
}

/// Session cookie settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CookieSettings {
    pub expiry_days: u32,
    pub key: String,
    pub name: String,
}

impl Default for CookieSettings {
    fn default() -> Self {
        CookieSettings {
            expiry_days: 30,
            key: "pmj_cookie".to_string(),
            name: "pmj_login".to_string(),
        }
    }
}

/// The credential file: accounts plus cookie settings
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct CredentialConfig {
    pub credentials: Credentials,
    #[serde(default)]
    pub cookie: CookieSettings,
    #[serde(default)]
    pub preauthorized: Vec<String>,
}

impl CredentialConfig {
    /// Config holding only the default `admin` account
    ///
    /// The account is `admin` / `admin123`, hashed with a fresh salt, and the
    /// cookie settings are the defaults.
    ///
    /// # Returns
    /// * `AppResult<CredentialConfig>` - The config, or an error if hashing failed
    pub fn with_default_admin() -> AppResult<Self> {
        let mut usernames = BTreeMap::new();
        usernames.insert(
            DEFAULT_USERNAME.to_string(),
            UserRecord {
                email: "admin@example.com".to_string(),
                name: "Admin User".to_string(),
                password: hash_password(DEFAULT_PASSWORD)?,
            },
        );

        Ok(CredentialConfig {
            credentials: Credentials { usernames },
            cookie: CookieSettings::default(),
            preauthorized: Vec::new(),
        })
    }

    /// Read the credential file, writing the default one first if it is missing
    ///
    /// # Arguments
    /// * `path` - Location of the YAML credential file
    ///
    /// # Returns
    /// * `AppResult<CredentialConfig>` - The parsed config
    ///
    /// # Errors
    /// * `AppError::Config` if the file exists but is not a valid credential file
    /// * `AppError::Io` if it cannot be read or created
    pub fn load_or_init(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            let config = Self::with_default_admin()?;
            config.save(path)?;
            warn!(
                "Created {} with default account '{}'; change its password",
                path.display(),
                DEFAULT_USERNAME
            );
            return Ok(config);
        }

        let contents = fs::read_to_string(path)?;
        serde_yaml::from_str(&contents)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Write the config as YAML, creating the parent directory if needed
    ///
    /// # Arguments
    /// * `path` - Destination file; an existing file is replaced
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }
        let yaml = serde_yaml::to_string(self).map_err(|e| AppError::Config(e.to_string()))?;
        fs::write(path, yaml)?;
        Ok(())
    }
}

/// Who is logged in
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub username: String,
    pub name: String,
    pub email: String,
}

/// Result of a login attempt
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Authenticated(Identity),
    Rejected,
    /// Nothing was submitted yet
    Pending,
}

/// Capability to check a username/password pair
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, username: &str, password: &str) -> SessionOutcome;
}

/// Checks submitted credentials against a [`CredentialConfig`]
pub struct CredentialAuthenticator {
    users: BTreeMap<String, UserRecord>,
}

impl CredentialAuthenticator {
    /// Snapshot the accounts of `config`
    ///
    /// Later changes to the config are not seen by this authenticator.
    pub fn new(config: &CredentialConfig) -> Self {
        CredentialAuthenticator {
            users: config.credentials.usernames.clone(),
        }
    }
}

impl Authenticator for CredentialAuthenticator {
    fn authenticate(&self, username: &str, password: &str) -> SessionOutcome {
        let username = username.trim();
        if username.is_empty() && password.is_empty() {
            return SessionOutcome::Pending;
        }

        let Some(user) = self.users.get(username) else {
            warn!("Login rejected for unknown user '{}'", username);
            return SessionOutcome::Rejected;
        };

        match verify_password(password, &user.password) {
            Ok(true) => {
                info!("User '{}' logged in", username);
                SessionOutcome::Authenticated(Identity {
                    username: username.to_string(),
                    name: user.name.clone(),
                    email: user.email.clone(),
                })
            }
            Ok(false) => {
                warn!("Login rejected for user '{}'", username);
                SessionOutcome::Rejected
            }
            Err(e) => {
                warn!("Stored password for '{}' is unusable: {}", username, e);
                SessionOutcome::Rejected
            }
        }
    }
}

/// Hash a password using Argon2 with a fresh random salt
///
/// # Arguments
/// * `password` - Plaintext password to hash
///
/// # Returns
/// * `AppResult<String>` - PHC-format hash string suitable for the credential file
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Config(format!("Password hashing failed: {}", e)))
}

/// Check a plaintext password against a stored Argon2 hash
///
/// # Arguments
/// * `password` - Plaintext password submitted by the user
/// * `hash` - Stored hash from the credential file
///
/// # Returns
/// * `Ok(true)` if the password matches
/// * `Ok(false)` if it does not
///
/// # Errors
/// * `AppError::Config` if the stored hash itself could not be parsed
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Config(format!("Invalid password hash format: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[derive(Debug, Clone)]
struct Session {
    identity: Identity,
    expires_at: SystemTime,
}

/// Active login sessions keyed by opaque token
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    /// Empty store whose sessions last `ttl`
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Empty store whose sessions last `expiry_days` from the cookie settings
    pub fn from_cookie(settings: &CookieSettings) -> Self {
        Self::new(Duration::from_secs(u64::from(settings.expiry_days) * 24 * 60 * 60))
    }

    /// Start a session and return its token
    ///
    /// Expired sessions are dropped at the same time.
    ///
    /// # Arguments
    /// * `identity` - The user the session belongs to
    ///
    /// # Returns
    /// * `AppResult<String>` - Random token to put in the session cookie
    ///
    /// # Errors
    /// * `AppError::StorageUnavailable` if the session table is poisoned
    pub fn create(&self, identity: Identity) -> AppResult<String> {
        let now = SystemTime::now();
        let token = Uuid::new_v4().to_string();
        let session = Session {
            identity,
            expires_at: now + self.ttl,
        };

        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| AppError::storage("session table is unavailable"))?;
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(token.clone(), session);
        Ok(token)
    }

    /// Identity behind `token` if the session exists and has not expired
    ///
    /// An expired session is removed when it is looked up.
    ///
    /// # Arguments
    /// * `token` - Value of the session cookie
    ///
    /// # Returns
    /// * `Option<Identity>` - The logged-in user, or `None`
    pub fn validate(&self, token: &str) -> Option<Identity> {
        let now = SystemTime::now();
        let found = self.sessions.read().ok()?.get(token).cloned()?;

        if found.expires_at > now {
            return Some(found.identity);
        }

        self.revoke(token);
        None
    }

    /// End the session behind `token`; unknown tokens are ignored
    pub fn revoke(&self, token: &str) {
        if let Ok(mut sessions) = self.sessions.write() {
            if let Some(session) = sessions.remove(token) {
                info!("User '{}' logged out", session.identity.username);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_admin_logs_in() {
        let config = CredentialConfig::with_default_admin().unwrap();
        let auth = CredentialAuthenticator::new(&config);

        match auth.authenticate("admin", "admin123") {
            SessionOutcome::Authenticated(identity) => {
                assert_eq!(identity.username, "admin");
                assert_eq!(identity.name, "Admin User");
            }
            other => panic!("expected authenticated, got {:?}", other),
        }
    }

    #[test]
    fn wrong_password_and_unknown_user_are_rejected() {
        let config = CredentialConfig::with_default_admin().unwrap();
        let auth = CredentialAuthenticator::new(&config);

        assert_eq!(auth.authenticate("admin", "wrong"), SessionOutcome::Rejected);
        assert_eq!(auth.authenticate("nobody", "admin123"), SessionOutcome::Rejected);
        assert_eq!(auth.authenticate("", ""), SessionOutcome::Pending);
    }

    #[test]
    fn malformed_hash_is_rejected() {
        let mut config = CredentialConfig::default();
        config.credentials.usernames.insert(
            "broken".to_string(),
            UserRecord {
                email: String::new(),
                name: "Broken".to_string(),
                password: "plaintext".to_string(),
            },
        );
        let auth = CredentialAuthenticator::new(&config);
        assert_eq!(auth.authenticate("broken", "plaintext"), SessionOutcome::Rejected);
    }

    #[test]
    fn credential_file_is_created_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let first = CredentialConfig::load_or_init(&path).unwrap();
        assert!(path.exists());
        assert_eq!(first.cookie, CookieSettings::default());

        let second = CredentialConfig::load_or_init(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn sessions_validate_until_revoked_or_expired() {
        let identity = Identity {
            username: "admin".to_string(),
            name: "Admin User".to_string(),
            email: "admin@example.com".to_string(),
        };

        let store = SessionStore::new(Duration::from_secs(60));
        let token = store.create(identity.clone()).unwrap();
        assert_eq!(store.validate(&token), Some(identity.clone()));
        store.revoke(&token);
        assert_eq!(store.validate(&token), None);

        let expired = SessionStore::new(Duration::ZERO);
        let token = expired.create(identity).unwrap();
        assert_eq!(expired.validate(&token), None);
        assert_eq!(expired.validate("not-a-token"), None);
    }

    fn admin() -> Identity {
        Identity {
            username: "admin".to_string(),
            name: "Admin User".to_string(),
            email: "admin@example.com".to_string(),
        }
    }

    #[test]
    fn abandoned_sessions_are_dropped_on_next_login() {
        let store = SessionStore::new(Duration::ZERO);
        for _ in 0..5 {
            store.create(admin()).unwrap();
        }
        assert_eq!(store.sessions.read().unwrap().len(), 1);

        let store = SessionStore::new(Duration::from_secs(60));
        store.create(admin()).unwrap();
        store.create(admin()).unwrap();
        assert_eq!(store.sessions.read().unwrap().len(), 2);
    }

    #[test]
    fn poisoned_session_table_fails_login() {
        let store = std::sync::Arc::new(SessionStore::new(Duration::from_secs(60)));
        let poisoner = std::sync::Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.sessions.write().unwrap();
            panic!("poison the session table");
        })
        .join();

        assert!(matches!(store.create(admin()), Err(AppError::StorageUnavailable(_))));
    }
}
