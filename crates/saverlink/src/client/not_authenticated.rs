//! Implementation for the not-authenticated state.

use std::marker::PhantomData;

use super::Client;
use super::states::{Authenticated, NotAuthenticated};
use crate::Result;
use crate::config::SiteConfig;
use crate::credentials::Credentials;
use crate::login::SessionAuthenticator;
use crate::session::Session;

impl Client<NotAuthenticated> {
    /// Creates a client with an empty session.
    ///
    /// No request is sent until [`Self::login`].
    pub fn new(config: SiteConfig) -> Result<Self> {
        config.validate()?;
        let session = Session::new(&config)?;
        Ok(Self {
            config,
            session,
            _state: PhantomData,
        })
    }

    /// Creates a client and logs in.
    pub async fn connect(config: SiteConfig, credentials: &Credentials) -> Result<Client<Authenticated>> {
        Self::new(config)?.login(credentials).await
    }

    /// Runs the configured login sequence.
    ///
    /// Consumes self and returns an authenticated client on success. On
    /// failure the session is discarded; start over with a new client.
    pub async fn login(mut self, credentials: &Credentials) -> Result<Client<Authenticated>> {
        SessionAuthenticator::new(&self.config)?
            .authenticate(&mut self.session, credentials)
            .await?;
        Ok(self.into_state())
    }
}
