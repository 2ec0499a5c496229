//! Persisted token file.
//!
//! The token record lives as JSON at a fixed path. Writes go through a
//! temporary file and a rename so a crash never leaves a truncated record.

use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::credential::StoredToken;
use crate::error::{AuthError, AuthResult};

/// File-backed storage for a single [`StoredToken`].
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if a token file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads the token record.
    ///
    /// Returns `Ok(None)` when no file exists, and a `CredentialFormat`
    /// error when the file exists but cannot be parsed.
    pub fn read(&self) -> AuthResult<Option<StoredToken>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no token file at {:?}", self.path);
                return Ok(None);
            }
            Err(e) => {
                return Err(AuthError::credential_format(format!(
                    "failed to read token file {}: {}",
                    self.path.display(),
                    e
                ))
                .with_source(e));
            }
        };

        let token = StoredToken::from_json(&content).map_err(|e| {
            AuthError::credential_format(format!("{} ({})", e.message(), self.path.display()))
        })?;
        debug!("loaded token from {:?}", self.path);
        Ok(Some(token))
    }

    /// Writes the token record atomically.
    pub fn write(&self, token: &StoredToken) -> AuthResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                AuthError::configuration(format!("failed to create token directory: {}", e))
                    .with_source(e)
            })?;
        }

        let content = serde_json::to_string_pretty(token)
            .map_err(|e| AuthError::internal(format!("failed to serialize token: {}", e)))?;

        let temp_path = self.temp_path();
        write_private(&temp_path, content.as_bytes()).map_err(|e| {
            AuthError::configuration(format!("failed to write token file: {}", e)).with_source(e)
        })?;

        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            AuthError::configuration(format!("failed to rename token file: {}", e)).with_source(e)
        })?;

        debug!("saved token to {:?}", self.path);
        Ok(())
    }

    /// Deletes the token file, if any.
    pub fn clear(&self) -> AuthResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("cleared token at {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::configuration(format!(
                "failed to remove token file: {}",
                e
            ))
            .with_source(e)),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Creates `path` fresh, owner-only on Unix from the moment it exists.
fn write_private(path: &Path, content: &[u8]) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => debug!("removed stale temp file {:?}", path),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(content)?;
    file.sync_all()
}
