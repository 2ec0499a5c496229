//! Credential sources.
//!
//! A credential is assembled from a token record plus client keys. Both
//! can come from the environment (inline JSON) or from files. Each
//! [`CredentialSource`] tries one origin for the token; a [`SourceChain`]
//! tries them in order and stops at the first hit.
//!
//! Every source follows the same rule: nothing configured or nothing on
//! disk is `Ok(None)`, while data that exists but does not parse is a
//! `CredentialFormat` error.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::credential::{ClientKeys, Credential, StoredToken};
use crate::error::{AuthError, AuthResult};
use crate::storage::TokenStore;

/// Looks up an environment variable by name.
///
/// Injected so tests never touch the process environment.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads from the real process environment, ignoring empty values.
pub fn process_env() -> EnvLookup {
    Arc::new(|name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
}

/// Where client keys come from: an inline environment value first, then a
/// file.
#[derive(Clone)]
pub struct KeySource {
    env_var: Option<String>,
    path: Option<PathBuf>,
    env: EnvLookup,
}

impl KeySource {
    pub fn new(env_var: Option<String>, path: Option<PathBuf>) -> Self {
        Self {
            env_var,
            path,
            env: process_env(),
        }
    }

    /// Replaces the environment lookup.
    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    /// Reads keys from the environment variable only.
    pub fn read_env(&self) -> AuthResult<Option<ClientKeys>> {
        let Some(var) = self.env_var.as_deref() else {
            return Ok(None);
        };
        match (self.env)(var) {
            Some(json) => ClientKeys::from_json(&json)
                .map(Some)
                .map_err(|e| AuthError::credential_format(format!("{} (${})", e.message(), var))),
            None => Ok(None),
        }
    }

    /// Reads keys from the key file only.
    pub fn read_file(&self) -> AuthResult<Option<ClientKeys>> {
        match self.path.as_ref() {
            Some(path) if path.exists() => ClientKeys::from_file(path).map(Some),
            Some(path) => {
                debug!("no client key file at {:?}", path);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Reads keys from the environment, falling back to the file.
    pub fn read(&self) -> AuthResult<Option<ClientKeys>> {
        match self.read_env()? {
            Some(keys) => Ok(Some(keys)),
            None => self.read_file(),
        }
    }

    /// Like [`read`](Self::read), but missing keys are an error.
    pub fn require(&self) -> AuthResult<ClientKeys> {
        self.read()?.ok_or_else(|| {
            let mut places = Vec::new();
            if let Some(var) = &self.env_var {
                places.push(format!("${}", var));
            }
            if let Some(path) = &self.path {
                places.push(path.display().to_string());
            }
            AuthError::configuration(format!(
                "OAuth client keys not found (looked in: {})",
                places.join(", ")
            ))
        })
    }
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySource")
            .field("env_var", &self.env_var)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// One origin of a stored token.
pub trait CredentialSource: Send + Sync {
    /// Short name used in logs and status output.
    fn name(&self) -> &'static str;

    /// Loads a credential, or `None` if this source has nothing.
    fn load(&self) -> AuthResult<Option<Credential>>;
}

/// Token JSON from an environment variable, merged with keys from the
/// environment or the key file.
pub struct EnvSource {
    token_var: String,
    keys: KeySource,
    env: EnvLookup,
}

impl EnvSource {
    pub fn new(token_var: impl Into<String>, keys: KeySource) -> Self {
        Self {
            token_var: token_var.into(),
            keys,
            env: process_env(),
        }
    }

    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }
}

impl CredentialSource for EnvSource {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn load(&self) -> AuthResult<Option<Credential>> {
        let Some(json) = (self.env)(&self.token_var) else {
            return Ok(None);
        };

        let token = StoredToken::from_json(&json).map_err(|e| {
            AuthError::credential_format(format!("{} (${})", e.message(), self.token_var))
        })?;

        let keys = match self.keys.read()? {
            Some(keys) => keys,
            None => token.embedded_keys().ok_or_else(|| {
                AuthError::credential_format(format!(
                    "${} is set but no client keys are available",
                    self.token_var
                ))
            })?,
        };

        debug!("loaded credential from ${}", self.token_var);
        Ok(Some(Credential::from_parts(token, &keys)))
    }
}

/// Token from the persisted token file, merged with keys from the key file.
pub struct FileSource {
    store: TokenStore,
    keys: KeySource,
}

impl FileSource {
    pub fn new(store: TokenStore, keys: KeySource) -> Self {
        Self { store, keys }
    }
}

impl CredentialSource for FileSource {
    fn name(&self) -> &'static str {
        "token file"
    }

    fn load(&self) -> AuthResult<Option<Credential>> {
        let Some(token) = self.store.read()? else {
            return Ok(None);
        };

        let keys = match self.keys.read_file()? {
            Some(keys) => keys,
            None => token.embedded_keys().ok_or_else(|| {
                AuthError::credential_format(format!(
                    "token file {} has no client keys and no key file is available",
                    self.store.path().display()
                ))
            })?,
        };

        Ok(Some(Credential::from_parts(token, &keys)))
    }
}

/// An ordered list of sources; the first one that yields a credential wins.
#[derive(Default)]
pub struct SourceChain {
    sources: Vec<Box<dyn CredentialSource>>,
}

impl SourceChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a source to the end of the chain.
    pub fn with_source(mut self, source: impl CredentialSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Tries each source in order.
    ///
    /// Returns the credential with the name of the source that produced it.
    /// A malformed source stops the chain with its error.
    pub fn load(&self) -> AuthResult<Option<(Credential, &'static str)>> {
        for source in &self.sources {
            if let Some(credential) = source.load()? {
                return Ok(Some((credential, source.name())));
            }
            debug!("credential source '{}' has nothing", source.name());
        }
        Ok(None)
    }
}

impl fmt::Debug for SourceChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.sources.iter().map(|s| s.name()))
            .finish()
    }
}
