//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `Credential`: the opaque DRF token proving authentication
//! - `Session`: credential + resolved identity with change notifications
//! - `TokenStore`: durable storage for the credential (file, OS keychain, memory)
//!
//! The persisted credential always mirrors the in-memory one, so a restarted
//! process resumes in the pending-identity state.

pub mod credential;
pub mod session;
pub mod token_store;

pub use credential::{Credential, EmptyCredential};
pub use session::{
    IdentityOutcome, IdentityRequest, Session, SessionError, SessionSnapshot, SessionState,
};
pub use token_store::{
    FileTokenStore, KeyringTokenStore, MemoryTokenStore, StorageError, TokenStore,
};
