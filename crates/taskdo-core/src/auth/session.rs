//! The session store: single source of truth for whether the caller is
//! authenticated, and as whom.
//!
//! State moves `LoggedOut -> PendingIdentity -> Resolved`. Every credential
//! change bumps a generation counter; identity results requested under an
//! older generation are dropped, so a profile response that lands after
//! `logout` (or after a second login) never overwrites the current state.

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::UserIdentity;

use super::token_store::{StorageError, TokenStore};
use super::Credential;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Failed to persist credential: {0}")]
    Storage(#[from] StorageError),
}

impl SessionError {
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Api(e) => e.user_message(),
            SessionError::Storage(e) => format!("Could not save login: {}", e),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, SessionError::Api(ApiError::Auth { .. }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    /// Credential held, identity not (yet) resolved
    PendingIdentity,
    Resolved,
}

/// What subscribers see after each change.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub generation: u64,
    pub state: SessionState,
    pub credential: Option<Credential>,
    pub identity: Option<UserIdentity>,
}

/// A profile fetch bound to the credential it was issued for.
///
/// Obtained from [`Session::identity_request`]; owns everything it needs so it
/// can run on a spawned task while the session keeps serving other calls.
#[derive(Debug, Clone)]
pub struct IdentityRequest {
    generation: u64,
    credential: Credential,
    api: ApiClient,
}

impl IdentityRequest {
    pub async fn fetch(self) -> IdentityOutcome {
        let result = self.api.fetch_profile(&self.credential).await;
        IdentityOutcome {
            generation: self.generation,
            result,
        }
    }
}

#[derive(Debug)]
pub struct IdentityOutcome {
    generation: u64,
    result: Result<UserIdentity, ApiError>,
}

pub struct Session {
    api: ApiClient,
    store: Box<dyn TokenStore>,
    credential: Option<Credential>,
    identity: Option<UserIdentity>,
    generation: u64,
    changes: watch::Sender<SessionSnapshot>,
}

impl Session {
    /// A logged-out session. Does not read the store.
    pub fn new(api: ApiClient, store: Box<dyn TokenStore>) -> Self {
        let (changes, _) = watch::channel(SessionSnapshot {
            generation: 0,
            state: SessionState::LoggedOut,
            credential: None,
            identity: None,
        });
        Self {
            api,
            store,
            credential: None,
            identity: None,
            generation: 0,
            changes,
        }
    }

    /// Resume from the persisted credential, if any.
    ///
    /// An unreadable store is logged and treated as logged out.
    pub fn restore(api: ApiClient, store: Box<dyn TokenStore>) -> Self {
        let mut session = Self::new(api, store);
        match session.store.load() {
            Ok(Some(credential)) => {
                debug!("Restored persisted credential");
                session.set_credential(Some(credential));
            }
            Ok(None) => debug!("No persisted credential"),
            Err(e) => warn!(error = %e, "Failed to load persisted credential, starting logged out"),
        }
        session
    }

    /// [`Session::restore`], then resolve the identity when a credential was
    /// found. A failed profile fetch leaves the session `PendingIdentity`.
    pub async fn resume(api: ApiClient, store: Box<dyn TokenStore>) -> Self {
        let mut session = Self::restore(api, store);
        if session.is_authenticated() {
            session.resolve_identity().await;
        }
        session
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> SessionState {
        match (&self.credential, &self.identity) {
            (None, _) => SessionState::LoggedOut,
            (Some(_), None) => SessionState::PendingIdentity,
            (Some(_), Some(_)) => SessionState::Resolved,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// The credential, or `ApiError::Unauthenticated` before any request is sent
    pub fn require_credential(&self) -> Result<&Credential, ApiError> {
        self.credential.as_ref().ok_or(ApiError::Unauthenticated)
    }

    pub fn identity(&self) -> Option<&UserIdentity> {
        self.identity.as_ref()
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            generation: self.generation,
            state: self.state(),
            credential: self.credential.clone(),
            identity: self.identity.clone(),
        }
    }

    /// Receive a snapshot after every credential or identity change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.changes.subscribe()
    }

    // =========================================================================
    // Login / logout
    // =========================================================================

    /// Exchange username and password for a credential, persist it and
    /// resolve the identity.
    ///
    /// On failure the previous session state is left untouched, in memory and
    /// in the store.
    pub async fn login(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<Credential, SessionError> {
        let credential = match self.api.authenticate(username, password).await {
            Ok(credential) => credential,
            Err(e) => {
                warn!(username = username, error = %e, "Login failed");
                return Err(e.into());
            }
        };

        // Persist first so memory never holds a credential the store lacks
        self.store.save(&credential)?;
        self.set_credential(Some(credential.clone()));
        info!(username = username, "Login successful");

        self.resolve_identity().await;
        Ok(credential)
    }

    /// Forget the credential and identity. No server call.
    ///
    /// Memory is cleared even when removing the persisted entry fails.
    pub fn logout(&mut self) -> Result<(), SessionError> {
        let was_authenticated = self.is_authenticated();
        self.set_credential(None);
        self.store.clear()?;
        if was_authenticated {
            info!("Logged out");
        }
        Ok(())
    }

    // =========================================================================
    // Identity resolution
    // =========================================================================

    /// Fetch and store the identity for the current credential.
    ///
    /// Failures are logged and leave the identity empty; nothing is retried.
    pub async fn resolve_identity(&mut self) -> Option<&UserIdentity> {
        let request = self.identity_request()?;
        let outcome = request.fetch().await;
        self.apply_identity(outcome);
        self.identity.as_ref()
    }

    /// A detached profile fetch for the current credential, or `None` when
    /// logged out.
    pub fn identity_request(&self) -> Option<IdentityRequest> {
        self.credential.as_ref().map(|credential| IdentityRequest {
            generation: self.generation,
            credential: credential.clone(),
            api: self.api.clone(),
        })
    }

    /// Apply a finished profile fetch. Returns `false` when the outcome was
    /// issued for a credential that has since changed and was discarded.
    pub fn apply_identity(&mut self, outcome: IdentityOutcome) -> bool {
        if outcome.generation != self.generation || self.credential.is_none() {
            debug!(
                requested = outcome.generation,
                current = self.generation,
                "Discarding stale identity result"
            );
            return false;
        }

        match outcome.result {
            Ok(identity) => {
                debug!(user_id = identity.id, "Identity resolved");
                self.identity = Some(identity);
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch user identity");
                self.identity = None;
            }
        }
        self.publish();
        true
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn set_credential(&mut self, credential: Option<Credential>) {
        self.credential = credential;
        self.identity = None;
        self.generation += 1;
        self.publish();
    }

    fn publish(&self) {
        self.changes.send_replace(self.snapshot());
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("generation", &self.generation)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}
