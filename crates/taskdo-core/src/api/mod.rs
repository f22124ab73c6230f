//! REST API client module for the Task To Do service.
//!
//! This module provides the `ApiClient` for authenticating users and
//! performing project CRUD against the task manager endpoints.
//!
//! The API uses DRF token authentication: every authenticated request
//! carries `Authorization: Token <credential>`.

pub mod client;
pub mod error;

pub use client::{ApiClient, DEFAULT_BASE_URL};
pub use error::ApiError;
