//! `PartyClient` builder: the collaborator-supplied inputs in one place.
//!
//! A party service is reached through a base location and a bearer token
//! obtained elsewhere. The client holds both, plus the connection settings,
//! and opens one [`PartySession`] per party.

use std::sync::Arc;

use partyline_party::{PartyListener, PartyOptions, PartySession, SessionPath};
use partyline_transport::{ConnectionConfig, build_location};

use crate::PartylineError;

/// Builder for a [`PartyClient`].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
///
/// use partyline::prelude::*;
///
/// let client = PartyClient::builder()
///     .location("https://party.example.com/v1")
///     .token("t0k3n")
///     .call_timeout(Some(Duration::from_secs(10)))
///     .build()
///     .unwrap();
/// assert_eq!(client.location(), "https://party.example.com/v1");
/// ```
#[derive(Default)]
pub struct PartyClientBuilder {
    location: Option<String>,
    token: Option<String>,
    config: ConnectionConfig,
}

impl PartyClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base location of the party service (`http`, `https`,
    /// `ws`, or `wss`).
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Sets the bearer token sent with every session.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the connection configuration.
    pub fn connection_config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets how long a call may wait for its response. `None` disables
    /// the deadline; calls then only fail when the connection closes.
    pub fn call_timeout(mut self, timeout: Option<std::time::Duration>) -> Self {
        self.config.engine = self.config.engine.with_call_timeout(timeout);
        self
    }

    /// Validates the settings and builds the client.
    ///
    /// # Errors
    /// - [`PartylineError::Config`] when the location or token is missing,
    ///   or the token is empty.
    /// - [`PartylineError::Transport`] when the location is not a URL with
    ///   a supported scheme.
    pub fn build(self) -> Result<PartyClient, PartylineError> {
        let location = self
            .location
            .ok_or_else(|| PartylineError::Config("location is required".into()))?;
        let token = self
            .token
            .ok_or_else(|| PartylineError::Config("token is required".into()))?;
        if token.is_empty() {
            return Err(PartylineError::Config("token must not be empty".into()));
        }

        // Fail on a bad location now rather than on the first open.
        build_location(&location, "", std::iter::empty::<(&str, &str)>())?;

        Ok(PartyClient {
            location,
            token,
            config: self.config,
        })
    }
}

/// Opens party sessions against one party service.
#[derive(Clone)]
pub struct PartyClient {
    location: String,
    token: String,
    config: ConnectionConfig,
}

impl PartyClient {
    /// Creates a new builder.
    pub fn builder() -> PartyClientBuilder {
        PartyClientBuilder::new()
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Creates an idle session wired to `listener`, without opening it.
    pub fn session(&self, listener: Arc<dyn PartyListener>) -> PartySession {
        PartySession::new(listener, self.config.clone())
    }

    /// Creates a session and starts connecting it to `path`.
    ///
    /// Must be called from within a Tokio runtime. The returned session is
    /// `Connecting`; `listener.on_open` fires once it is usable.
    pub fn open(
        &self,
        path: &SessionPath,
        options: &PartyOptions,
        listener: Arc<dyn PartyListener>,
    ) -> Result<PartySession, PartylineError> {
        let session = self.session(listener);
        session.open(&self.location, &self.token, path, options)?;
        tracing::info!(location = %self.location, path = %path.to_path(), "party session requested");
        Ok(session)
    }
}

impl std::fmt::Debug for PartyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartyClient")
            .field("location", &self.location)
            .field("token", &"<redacted>")
            .field("config", &self.config)
            .finish()
    }
}
