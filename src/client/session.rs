// src/client/session.rs

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::Deserialize;

#[derive(Debug)]
pub enum SessionError {
    Io(io::Error),
    NotLoggedIn,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Io(e) => write!(f, "session file error: {}", e),
            SessionError::NotLoggedIn => write!(f, "not logged in (run `login` first)"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<io::Error> for SessionError {
    fn from(err: io::Error) -> Self {
        SessionError::Io(err)
    }
}

#[derive(Deserialize)]
struct Expiry {
    exp: u64,
}

/// Explicit client session: server base URL plus the bearer token, if any.
///
/// Lifecycle: `load` restores a saved token (dropping it when expired),
/// `begin` stores a fresh one after login, `end` clears it on logout or when
/// the server answers 401.
#[derive(Debug, Clone)]
pub struct Session {
    base_url: String,
    token: Option<String>,
    token_file: Option<PathBuf>,
}

impl Session {
    /// A session that is never written to disk.
    pub fn ephemeral(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            token_file: None,
        }
    }

    /// Restores the token saved in `token_file`. Expired tokens are discarded.
    pub fn load(base_url: impl Into<String>, token_file: &Path) -> Result<Self, SessionError> {
        let mut session = Self::ephemeral(base_url);
        session.token_file = Some(token_file.to_path_buf());

        match fs::read_to_string(token_file) {
            Ok(raw) => {
                let token = raw.trim().to_string();
                if token.is_empty() || token_expired(&token, unix_now()) {
                    tracing::debug!("Discarding stale token at {}", token_file.display());
                    session.end()?;
                } else {
                    session.token = Some(token);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(session)
    }

    pub fn begin(&mut self, token: String) -> Result<(), SessionError> {
        if let Some(path) = &self.token_file {
            fs::write(path, &token)?;
        }
        self.token = Some(token);
        Ok(())
    }

    pub fn end(&mut self) -> Result<(), SessionError> {
        self.token = None;
        if let Some(path) = &self.token_file {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn require_token(&self) -> Result<&str, SessionError> {
        self.token().ok_or(SessionError::NotLoggedIn)
    }

    pub fn is_active(&self) -> bool {
        self.token
            .as_deref()
            .is_some_and(|t| !token_expired(t, unix_now()))
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Reads the `exp` claim. The client holds no key, so the signature is not
/// checked here; the server verifies every request.
fn token_expired(token: &str, now: u64) -> bool {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;

    match decode::<Expiry>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => data.claims.exp <= now,
        Err(_) => true,
    }
}
