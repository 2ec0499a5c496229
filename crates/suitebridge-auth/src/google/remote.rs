//! Google-backed [`RemoteService`] and [`AuthorizationProvider`].

use suitebridge_core::{BusyInterval, TimeWindow};

use crate::client::AuthClient;
use crate::credential::{ClientKeys, Credential};
use crate::error::AuthResult;
use crate::remote::{AuthorizationProvider, BoxFuture, RemoteService};

use super::calendar::GoogleCalendar;
use super::config::GoogleConfig;
use super::oauth::GoogleOAuth;

/// Talks to Google's OAuth and Calendar endpoints.
#[derive(Debug)]
pub struct GoogleRemote {
    config: GoogleConfig,
    oauth: GoogleOAuth,
    calendar: GoogleCalendar,
}

impl GoogleRemote {
    pub fn new(config: GoogleConfig) -> AuthResult<Self> {
        let oauth = GoogleOAuth::new(&config)?;
        let calendar = GoogleCalendar::new(&config)?;
        Ok(Self {
            config,
            oauth,
            calendar,
        })
    }
}

impl RemoteService for GoogleRemote {
    fn probe_access_token<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> BoxFuture<'a, AuthResult<Credential>> {
        Box::pin(self.oauth.probe(credential))
    }

    fn refresh_access_token<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> BoxFuture<'a, AuthResult<Credential>> {
        Box::pin(self.oauth.refresh(credential))
    }

    fn list_busy_intervals<'a>(
        &'a self,
        client: &'a AuthClient,
        window: &'a TimeWindow,
    ) -> BoxFuture<'a, AuthResult<Vec<BusyInterval>>> {
        Box::pin(async move {
            let authorization = client.authorization_header().await?;
            self.calendar
                .list_busy_intervals(&authorization, &self.config.calendar_id, window)
                .await
        })
    }
}

impl AuthorizationProvider for GoogleRemote {
    fn interactive_authorize<'a>(
        &'a self,
        scopes: &'a [String],
        keys: &'a ClientKeys,
    ) -> BoxFuture<'a, AuthResult<Credential>> {
        Box::pin(self.oauth.authorize(keys, scopes))
    }
}
