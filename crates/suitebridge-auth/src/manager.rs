//! Credential lifecycle: load, validate, refresh, persist.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::client::AuthClient;
use crate::credential::{Credential, TokenState};
use crate::error::{AuthError, AuthResult};
use crate::remote::{AuthorizationProvider, RemoteService};
use crate::source::{EnvLookup, EnvSource, FileSource, KeySource, SourceChain, process_env};
use crate::storage::TokenStore;

/// Default window before expiry in which a refresh is attempted.
pub const DEFAULT_REFRESH_HORIZON_SECS: i64 = 300;

/// Locations and policy for a standard env-then-file credential setup.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub token_path: PathBuf,
    pub credentials_path: Option<PathBuf>,
    pub token_env: Option<String>,
    pub credentials_env: Option<String>,
    pub scopes: Vec<String>,
    pub refresh_horizon: Duration,
}

impl ManagerSettings {
    pub fn new(token_path: impl Into<PathBuf>) -> Self {
        Self {
            token_path: token_path.into(),
            credentials_path: None,
            token_env: None,
            credentials_env: None,
            scopes: Vec::new(),
            refresh_horizon: Duration::seconds(DEFAULT_REFRESH_HORIZON_SECS),
        }
    }
}

/// Snapshot of the stored credential for status reporting.
#[derive(Debug, Clone)]
pub struct CredentialStatus {
    /// Name of the source the credential came from.
    pub source: String,
    pub state: TokenState,
    pub expiry: Option<DateTime<Utc>>,
    pub has_refresh_token: bool,
    pub client_id: String,
}

/// Owns the credential lifecycle.
///
/// Reads credentials from a [`SourceChain`], keeps them fresh through a
/// [`RemoteService`], and writes every accepted change back to the
/// [`TokenStore`].
pub struct CredentialManager {
    sources: SourceChain,
    keys: KeySource,
    store: TokenStore,
    remote: Arc<dyn RemoteService>,
    authorizer: Arc<dyn AuthorizationProvider>,
    scopes: Vec<String>,
    refresh_horizon: Duration,
}

impl CredentialManager {
    pub fn new(
        sources: SourceChain,
        keys: KeySource,
        store: TokenStore,
        remote: Arc<dyn RemoteService>,
        authorizer: Arc<dyn AuthorizationProvider>,
    ) -> Self {
        Self {
            sources,
            keys,
            store,
            remote,
            authorizer,
            scopes: Vec::new(),
            refresh_horizon: Duration::seconds(DEFAULT_REFRESH_HORIZON_SECS),
        }
    }

    /// Builds the standard chain: token from the environment first, then
    /// the persisted token file.
    pub fn from_settings(
        settings: &ManagerSettings,
        remote: Arc<dyn RemoteService>,
        authorizer: Arc<dyn AuthorizationProvider>,
    ) -> Self {
        Self::from_settings_with_env(settings, process_env(), remote, authorizer)
    }

    pub fn from_settings_with_env(
        settings: &ManagerSettings,
        env: EnvLookup,
        remote: Arc<dyn RemoteService>,
        authorizer: Arc<dyn AuthorizationProvider>,
    ) -> Self {
        let keys = KeySource::new(
            settings.credentials_env.clone(),
            settings.credentials_path.clone(),
        )
        .with_env(env.clone());
        let store = TokenStore::new(&settings.token_path);

        let mut sources = SourceChain::new();
        if let Some(var) = &settings.token_env {
            sources = sources.with_source(EnvSource::new(var.clone(), keys.clone()).with_env(env));
        }
        sources = sources.with_source(FileSource::new(store.clone(), keys.clone()));

        Self::new(sources, keys, store, remote, authorizer)
            .with_scopes(settings.scopes.clone())
            .with_refresh_horizon(settings.refresh_horizon)
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_refresh_horizon(mut self, horizon: Duration) -> Self {
        self.refresh_horizon = horizon;
        self
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn refresh_horizon(&self) -> Duration {
        self.refresh_horizon
    }

    /// The remote service, for calls that need an authorized client.
    pub fn remote(&self) -> &Arc<dyn RemoteService> {
        &self.remote
    }

    /// Loads a previously saved credential.
    ///
    /// `Ok(None)` means nothing is stored anywhere. Stored data that fails to
    /// parse is a `CredentialFormat` error.
    pub fn load(&self) -> AuthResult<Option<Credential>> {
        match self.sources.load()? {
            Some((credential, source)) => {
                debug!("using credential from {}", source);
                Ok(Some(credential))
            }
            None => Ok(None),
        }
    }

    /// Persists the client's current credential.
    pub async fn save(&self, client: &AuthClient) -> AuthResult<()> {
        let credential = client.lock().await;
        self.persist(&credential)
    }

    /// Makes sure the client holds a usable access token.
    pub async fn ensure_valid(&self, client: &AuthClient) -> AuthResult<()> {
        self.ensure_valid_at(client, Utc::now()).await
    }

    /// [`ensure_valid`](Self::ensure_valid) against an explicit clock.
    ///
    /// An expired credential must refresh; failure is `AuthExpired`. A
    /// credential inside the refresh horizon tries to refresh; failure is
    /// logged and the still-valid token is kept.
    pub async fn ensure_valid_at(
        &self,
        client: &AuthClient,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        // Held across refresh and persist; a second caller re-checks the
        // state the first one left behind.
        let mut credential = client.lock().await;

        match credential.state_at(now, self.refresh_horizon) {
            TokenState::Valid => Ok(()),
            TokenState::Expired => {
                info!("access token expired, refreshing");
                self.refresh_locked(&mut credential, now)
                    .await
                    .map_err(|e| {
                        error!("refresh of expired token failed: {}", e);
                        AuthError::auth_expired(format!(
                            "access token expired and could not be refreshed ({}); \
                             delete {} and run `suitebridge auth login` to re-authorize",
                            e,
                            self.store.path().display()
                        ))
                        .with_source(e)
                    })
            }
            TokenState::Expiring => {
                debug!(
                    "access token expires within {}s, refreshing",
                    self.refresh_horizon.num_seconds()
                );
                if let Err(e) = self.refresh_locked(&mut credential, now).await {
                    let transient = AuthError::refresh_transient(format!(
                        "refresh before expiry failed, keeping current token: {}",
                        e
                    ))
                    .with_source(e);
                    warn!("{}", transient);
                }
                Ok(())
            }
        }
    }

    /// Refreshes while the client lock is held.
    async fn refresh_locked(
        &self,
        credential: &mut Credential,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        if credential.refresh_token.is_none() {
            return Err(AuthError::authentication("no refresh token available"));
        }

        let refreshed = self.remote.refresh_access_token(credential).await?;
        let refreshed = carry_over(credential, refreshed);

        if !credential.is_superseded_by(&refreshed) {
            return Err(AuthError::invalid_response(
                "refreshed token does not extend the current expiry",
            ));
        }
        if refreshed.expiry.is_some_and(|expiry| expiry <= now) {
            return Err(AuthError::invalid_response("refreshed token is already expired"));
        }

        *credential = refreshed;
        info!("access token refreshed, expires at {:?}", credential.expiry);

        // The new token is already usable in memory; a failed write only
        // costs a refresh on the next start.
        if let Err(e) = self.persist(credential) {
            warn!("failed to persist refreshed token: {}", e);
        }
        Ok(())
    }

    /// Returns an authorized client, running the interactive flow if needed.
    ///
    /// A stored credential is probed first. If the probe fails, or nothing is
    /// stored, the authorization provider runs and its credential is saved.
    pub async fn authorize(&self) -> AuthResult<AuthClient> {
        if let Some(stored) = self.load()? {
            match self.remote.probe_access_token(&stored).await {
                Ok(probed) => {
                    let probed = carry_over(&stored, probed);
                    let credential = if stored.is_superseded_by(&probed) {
                        probed
                    } else {
                        stored
                    };
                    let client = AuthClient::new(credential);
                    self.save(&client).await?;
                    return Ok(client);
                }
                Err(e) => {
                    warn!("stored credential rejected, starting authorization: {}", e);
                }
            }
        }

        self.authorize_interactive().await
    }

    /// Runs the interactive flow unconditionally and saves the result.
    pub async fn authorize_interactive(&self) -> AuthResult<AuthClient> {
        let keys = self.keys.require()?;
        info!("starting interactive authorization");
        let credential = self.authorizer.interactive_authorize(&self.scopes, &keys).await?;
        let client = AuthClient::new(credential);
        self.save(&client).await?;
        Ok(client)
    }

    /// Describes the stored credential without touching the network.
    pub fn status_at(&self, now: DateTime<Utc>) -> AuthResult<Option<CredentialStatus>> {
        Ok(self.sources.load()?.map(|(credential, source)| CredentialStatus {
            source: source.to_string(),
            state: credential.state_at(now, self.refresh_horizon),
            expiry: credential.expiry,
            has_refresh_token: credential.refresh_token.is_some(),
            client_id: credential.client_id,
        }))
    }

    pub fn status(&self) -> AuthResult<Option<CredentialStatus>> {
        self.status_at(Utc::now())
    }

    /// Deletes the persisted token.
    pub fn logout(&self) -> AuthResult<()> {
        self.store.clear()
    }

    fn persist(&self, credential: &Credential) -> AuthResult<()> {
        let keys = match self.keys.read() {
            Ok(Some(keys)) => keys,
            Ok(None) => credential.keys(),
            Err(e) => {
                debug!("client key source unreadable, using credential identity: {}", e);
                credential.keys()
            }
        };
        self.store.write(&credential.to_stored(&keys))
    }
}

/// Fills in what a refresh or probe response leaves out.
fn carry_over(current: &Credential, mut next: Credential) -> Credential {
    if next.refresh_token.is_none() {
        next.refresh_token = current.refresh_token.clone();
    }
    next.client_id = current.client_id.clone();
    next.client_secret = current.client_secret.clone();
    next
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("sources", &self.sources)
            .field("keys", &self.keys)
            .field("store", &self.store)
            .field("scopes", &self.scopes)
            .field("refresh_horizon", &self.refresh_horizon)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{ClientKeys, StoredToken};
    use crate::error::AuthErrorCode;
    use crate::remote::BoxFuture;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use suitebridge_core::{BusyInterval, TimeWindow};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    fn credential(expiry: Option<DateTime<Utc>>) -> Credential {
        Credential::from_parts(
            StoredToken {
                access_token: Some("old-access".to_string()),
                refresh_token: Some("refresh".to_string()),
                token_type: Some("Bearer".to_string()),
                expiry_date: expiry,
                ..Default::default()
            },
            &ClientKeys::new("id", "secret"),
        )
    }

    /// What the fake remote does on refresh.
    #[derive(Clone, Copy)]
    enum RefreshBehavior {
        /// Issue a token valid for an hour after `now()`.
        Extend,
        /// Issue a token with the same expiry as the current one.
        Same,
        Fail,
    }

    struct FakeRemote {
        refresh: RefreshBehavior,
        probe_ok: bool,
        refresh_calls: AtomicUsize,
        probe_calls: AtomicUsize,
    }

    impl FakeRemote {
        fn new(refresh: RefreshBehavior) -> Arc<Self> {
            Arc::new(Self {
                refresh,
                probe_ok: true,
                refresh_calls: AtomicUsize::new(0),
                probe_calls: AtomicUsize::new(0),
            })
        }

        fn rejecting_probe() -> Arc<Self> {
            Arc::new(Self {
                refresh: RefreshBehavior::Fail,
                probe_ok: false,
                refresh_calls: AtomicUsize::new(0),
                probe_calls: AtomicUsize::new(0),
            })
        }
    }

    impl RemoteService for FakeRemote {
        fn probe_access_token<'a>(
            &'a self,
            credential: &'a Credential,
        ) -> BoxFuture<'a, AuthResult<Credential>> {
            Box::pin(async move {
                self.probe_calls.fetch_add(1, Ordering::SeqCst);
                if self.probe_ok {
                    Ok(credential.clone())
                } else {
                    Err(AuthError::authentication("invalid_grant"))
                }
            })
        }

        fn refresh_access_token<'a>(
            &'a self,
            credential: &'a Credential,
        ) -> BoxFuture<'a, AuthResult<Credential>> {
            Box::pin(async move {
                self.refresh_calls.fetch_add(1, Ordering::SeqCst);
                // Let a concurrent caller reach the lock while this one holds it.
                tokio::task::yield_now().await;
                let mut next = credential.clone();
                next.access_token = Some("new-access".to_string());
                next.refresh_token = None;
                match self.refresh {
                    RefreshBehavior::Extend => {
                        next.expiry = Some(now() + Duration::hours(1));
                        Ok(next)
                    }
                    RefreshBehavior::Same => Ok(next),
                    RefreshBehavior::Fail => Err(AuthError::network("connection reset")),
                }
            })
        }

        fn list_busy_intervals<'a>(
            &'a self,
            _client: &'a AuthClient,
            _window: &'a TimeWindow,
        ) -> BoxFuture<'a, AuthResult<Vec<BusyInterval>>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    struct FakeAuthorizer {
        calls: AtomicUsize,
        seen_scopes: Mutex<Vec<String>>,
    }

    impl FakeAuthorizer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                seen_scopes: Mutex::new(Vec::new()),
            })
        }
    }

    impl AuthorizationProvider for FakeAuthorizer {
        fn interactive_authorize<'a>(
            &'a self,
            scopes: &'a [String],
            keys: &'a ClientKeys,
        ) -> BoxFuture<'a, AuthResult<Credential>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                *self.seen_scopes.lock().unwrap() = scopes.to_vec();
                Ok(Credential::from_parts(
                    StoredToken {
                        access_token: Some("interactive-access".to_string()),
                        refresh_token: Some("interactive-refresh".to_string()),
                        expiry_date: Some(now() + Duration::hours(1)),
                        ..Default::default()
                    },
                    keys,
                ))
            })
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn settings(&self) -> ManagerSettings {
            let mut settings = ManagerSettings::new(self.dir.path().join("token.json"));
            settings.credentials_path = Some(self.dir.path().join("credentials.json"));
            settings.token_env = Some("TEST_TOKEN_JSON".to_string());
            settings.credentials_env = Some("TEST_KEYS_JSON".to_string());
            settings.scopes = vec!["calendar.readonly".to_string()];
            settings
        }

        fn write_keys(&self) {
            std::fs::write(
                self.dir.path().join("credentials.json"),
                r#"{"installed": {"client_id": "file-id", "client_secret": "file-secret"}}"#,
            )
            .unwrap();
        }

        fn manager(
            &self,
            remote: Arc<FakeRemote>,
            authorizer: Arc<FakeAuthorizer>,
        ) -> CredentialManager {
            let env: EnvLookup = Arc::new(|_: &str| None);
            CredentialManager::from_settings_with_env(&self.settings(), env, remote, authorizer)
        }

        fn manager_with_env(
            &self,
            vars: HashMap<String, String>,
            remote: Arc<FakeRemote>,
        ) -> CredentialManager {
            let env: EnvLookup = Arc::new(move |name: &str| vars.get(name).cloned());
            CredentialManager::from_settings_with_env(
                &self.settings(),
                env,
                remote,
                FakeAuthorizer::new(),
            )
        }

        fn stored(&self) -> Option<StoredToken> {
            TokenStore::new(self.dir.path().join("token.json"))
                .read()
                .unwrap()
        }
    }

    #[tokio::test]
    async fn load_without_anything_stored_is_none() {
        let fx = Fixture::new();
        let manager = fx.manager(FakeRemote::new(RefreshBehavior::Extend), FakeAuthorizer::new());
        assert!(manager.load().unwrap().is_none());
        assert!(manager.status_at(now()).unwrap().is_none());
    }

    #[tokio::test]
    async fn load_prefers_environment_token() {
        let fx = Fixture::new();
        fx.write_keys();
        let manager = fx.manager(FakeRemote::new(RefreshBehavior::Extend), FakeAuthorizer::new());
        let client = AuthClient::new(credential(Some(now())));
        manager.save(&client).await.unwrap();

        let vars = HashMap::from([(
            "TEST_TOKEN_JSON".to_string(),
            r#"{"refresh_token": "env-refresh"}"#.to_string(),
        )]);
        let manager = fx.manager_with_env(vars, FakeRemote::new(RefreshBehavior::Extend));
        let loaded = manager.load().unwrap().unwrap();
        assert_eq!(loaded.refresh_token.as_deref(), Some("env-refresh"));
        assert_eq!(manager.status_at(now()).unwrap().unwrap().source, "environment");
    }

    #[tokio::test]
    async fn expired_by_one_millisecond_refreshes() {
        let fx = Fixture::new();
        fx.write_keys();
        let remote = FakeRemote::new(RefreshBehavior::Extend);
        let manager = fx.manager(remote.clone(), FakeAuthorizer::new());
        let client = AuthClient::new(credential(Some(now() - Duration::milliseconds(1))));

        manager.ensure_valid_at(&client, now()).await.unwrap();

        assert_eq!(remote.refresh_calls.load(Ordering::SeqCst), 1);
        let current = client.credential().await;
        assert_eq!(current.access_token.as_deref(), Some("new-access"));
        assert!(current.expiry.unwrap() > now());
    }

    #[tokio::test]
    async fn refresh_persists_with_file_keys_and_kept_refresh_token() {
        let fx = Fixture::new();
        fx.write_keys();
        let manager = fx.manager(FakeRemote::new(RefreshBehavior::Extend), FakeAuthorizer::new());
        let client = AuthClient::new(credential(Some(now() - Duration::minutes(1))));

        manager.ensure_valid_at(&client, now()).await.unwrap();

        let stored = fx.stored().unwrap();
        assert_eq!(stored.access_token.as_deref(), Some("new-access"));
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(stored.client_id.as_deref(), Some("file-id"));
        assert_eq!(stored.client_secret.as_deref(), Some("file-secret"));
        assert_eq!(stored.expiry_date, Some(now() + Duration::hours(1)));
    }

    #[tokio::test]
    async fn expired_refresh_failure_requires_reauth() {
        let fx = Fixture::new();
        let manager = fx.manager(FakeRemote::new(RefreshBehavior::Fail), FakeAuthorizer::new());
        let client = AuthClient::new(credential(Some(now() - Duration::minutes(1))));

        let err = manager.ensure_valid_at(&client, now()).await.unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::AuthExpired);
        assert!(err.requires_reauth());
        assert!(err.message().contains("token.json"));
        assert!(fx.stored().is_none());
    }

    #[tokio::test]
    async fn expiring_refresh_failure_keeps_token() {
        let fx = Fixture::new();
        let remote = FakeRemote::new(RefreshBehavior::Fail);
        let manager = fx.manager(remote.clone(), FakeAuthorizer::new());
        let original = credential(Some(now() + Duration::minutes(2)));
        let client = AuthClient::new(original.clone());

        manager.ensure_valid_at(&client, now()).await.unwrap();

        assert_eq!(remote.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.credential().await, original);
    }

    #[tokio::test]
    async fn expiring_token_refreshes_and_persists() {
        let fx = Fixture::new();
        fx.write_keys();
        let remote = FakeRemote::new(RefreshBehavior::Extend);
        let manager = fx.manager(remote.clone(), FakeAuthorizer::new());
        let client = AuthClient::new(credential(Some(now() + Duration::minutes(2))));

        manager.ensure_valid_at(&client, now()).await.unwrap();

        assert_eq!(remote.refresh_calls.load(Ordering::SeqCst), 1);
        let current = client.credential().await;
        assert_eq!(current.access_token.as_deref(), Some("new-access"));
        assert_eq!(current.refresh_token.as_deref(), Some("refresh"));

        let stored = fx.stored().unwrap();
        assert_eq!(stored.access_token.as_deref(), Some("new-access"));
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(stored.expiry_date, Some(now() + Duration::hours(1)));
        assert_eq!(stored.client_id.as_deref(), Some("file-id"));
    }

    #[tokio::test]
    async fn refreshed_token_survives_failed_write() {
        let fx = Fixture::new();
        // A regular file where the token directory should be.
        let blocker = fx.dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let settings = ManagerSettings::new(blocker.join("token.json"));
        let env: EnvLookup = Arc::new(|_: &str| None);
        let remote = FakeRemote::new(RefreshBehavior::Extend);
        let manager = CredentialManager::from_settings_with_env(
            &settings,
            env,
            remote.clone(),
            FakeAuthorizer::new(),
        );
        let client = AuthClient::new(credential(Some(now() - Duration::minutes(1))));

        manager.ensure_valid_at(&client, now()).await.unwrap();

        assert_eq!(remote.refresh_calls.load(Ordering::SeqCst), 1);
        let current = client.credential().await;
        assert_eq!(current.access_token.as_deref(), Some("new-access"));
        assert_eq!(current.expiry, Some(now() + Duration::hours(1)));
        assert!(!manager.store().exists());
    }

    #[tokio::test]
    async fn valid_token_is_left_alone() {
        let fx = Fixture::new();
        let remote = FakeRemote::new(RefreshBehavior::Extend);
        let manager = fx.manager(remote.clone(), FakeAuthorizer::new());
        let client = AuthClient::new(credential(Some(now() + Duration::minutes(30))));

        manager.ensure_valid_at(&client, now()).await.unwrap();

        assert_eq!(remote.refresh_calls.load(Ordering::SeqCst), 0);
        assert!(fx.stored().is_none());
    }

    #[tokio::test]
    async fn missing_expiry_forces_refresh() {
        let fx = Fixture::new();
        let remote = FakeRemote::new(RefreshBehavior::Extend);
        let manager = fx.manager(remote.clone(), FakeAuthorizer::new());
        let client = AuthClient::new(credential(None));

        manager.ensure_valid_at(&client, now()).await.unwrap();

        assert_eq!(remote.refresh_calls.load(Ordering::SeqCst), 1);
        assert!(client.credential().await.expiry.is_some());
    }

    #[tokio::test]
    async fn non_extending_refresh_is_rejected() {
        let fx = Fixture::new();
        let manager = fx.manager(FakeRemote::new(RefreshBehavior::Same), FakeAuthorizer::new());
        let original = credential(Some(now() - Duration::minutes(1)));
        let client = AuthClient::new(original.clone());

        let err = manager.ensure_valid_at(&client, now()).await.unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::AuthExpired);
        assert_eq!(client.credential().await, original);
    }

    #[tokio::test]
    async fn expired_without_refresh_token_requires_reauth() {
        let fx = Fixture::new();
        let remote = FakeRemote::new(RefreshBehavior::Extend);
        let manager = fx.manager(remote.clone(), FakeAuthorizer::new());
        let mut original = credential(Some(now() - Duration::minutes(1)));
        original.refresh_token = None;
        let client = AuthClient::new(original);

        let err = manager.ensure_valid_at(&client, now()).await.unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::AuthExpired);
        assert_eq!(remote.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_callers_refresh_once() {
        let fx = Fixture::new();
        let remote = FakeRemote::new(RefreshBehavior::Extend);
        let manager = fx.manager(remote.clone(), FakeAuthorizer::new());
        let client = AuthClient::new(credential(Some(now() - Duration::minutes(1))));

        let (a, b) = tokio::join!(
            manager.ensure_valid_at(&client, now()),
            manager.ensure_valid_at(&client, now()),
        );
        a.unwrap();
        b.unwrap();
        assert_eq!(remote.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn authorize_reuses_stored_credential() {
        let fx = Fixture::new();
        fx.write_keys();
        let remote = FakeRemote::new(RefreshBehavior::Extend);
        let authorizer = FakeAuthorizer::new();
        let manager = fx.manager(remote.clone(), authorizer.clone());
        manager
            .save(&AuthClient::new(credential(Some(now()))))
            .await
            .unwrap();

        let client = manager.authorize().await.unwrap();

        assert_eq!(remote.probe_calls.load(Ordering::SeqCst), 1);
        assert_eq!(authorizer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(client.credential().await.access_token.as_deref(), Some("old-access"));
    }

    #[tokio::test]
    async fn authorize_falls_back_to_interactive_when_probe_fails() {
        let fx = Fixture::new();
        fx.write_keys();
        let authorizer = FakeAuthorizer::new();
        let manager = fx.manager(FakeRemote::rejecting_probe(), authorizer.clone());
        manager
            .save(&AuthClient::new(credential(Some(now()))))
            .await
            .unwrap();

        let client = manager.authorize().await.unwrap();

        assert_eq!(authorizer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *authorizer.seen_scopes.lock().unwrap(),
            vec!["calendar.readonly".to_string()]
        );
        let current = client.credential().await;
        assert_eq!(current.access_token.as_deref(), Some("interactive-access"));
        assert_eq!(current.client_id, "file-id");
        assert_eq!(
            fx.stored().unwrap().refresh_token.as_deref(),
            Some("interactive-refresh")
        );
    }

    #[tokio::test]
    async fn authorize_with_nothing_stored_runs_interactive() {
        let fx = Fixture::new();
        fx.write_keys();
        let authorizer = FakeAuthorizer::new();
        let remote = FakeRemote::new(RefreshBehavior::Extend);
        let manager = fx.manager(remote.clone(), authorizer.clone());

        manager.authorize().await.unwrap();

        assert_eq!(remote.probe_calls.load(Ordering::SeqCst), 0);
        assert_eq!(authorizer.calls.load(Ordering::SeqCst), 1);
        assert!(fx.stored().is_some());
    }

    #[tokio::test]
    async fn authorize_without_client_keys_is_configuration_error() {
        let fx = Fixture::new();
        let manager = fx.manager(FakeRemote::new(RefreshBehavior::Extend), FakeAuthorizer::new());
        let err = manager.authorize().await.unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::ConfigurationError);
    }

    #[tokio::test]
    async fn authorize_propagates_malformed_token_file() {
        let fx = Fixture::new();
        fx.write_keys();
        std::fs::write(fx.dir.path().join("token.json"), "{").unwrap();
        let authorizer = FakeAuthorizer::new();
        let manager = fx.manager(FakeRemote::new(RefreshBehavior::Extend), authorizer.clone());

        let err = manager.authorize().await.unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::CredentialFormat);
        assert_eq!(authorizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn status_and_logout() {
        let fx = Fixture::new();
        fx.write_keys();
        let manager = fx.manager(FakeRemote::new(RefreshBehavior::Extend), FakeAuthorizer::new());
        manager
            .save(&AuthClient::new(credential(Some(now() + Duration::minutes(2)))))
            .await
            .unwrap();

        let status = manager.status_at(now()).unwrap().unwrap();
        assert_eq!(status.source, "token file");
        assert_eq!(status.state, TokenState::Expiring);
        assert!(status.has_refresh_token);
        assert_eq!(status.client_id, "file-id");

        manager.logout().unwrap();
        assert!(manager.status_at(now()).unwrap().is_none());
    }
}
