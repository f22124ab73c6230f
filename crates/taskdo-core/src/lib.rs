//! Core library for taskdo.
//!
//! Provides the pieces a Task To Do front end is built from:
//!
//! - [`api::ApiClient`]: authenticated REST calls for projects and profiles
//! - [`auth::Session`]: credential + identity, persisted across restarts
//! - [`board::ProjectBoard`]: in-memory project list mirroring the server
//! - [`config::Config`]: user configuration on disk

pub mod api;
pub mod auth;
pub mod board;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{Credential, Session, SessionError, SessionState};
pub use board::{BoardError, ProjectBoard};
pub use config::Config;
