//! Data models for Task To Do entities.
//!
//! - `Project`, `NewProject`, `ProjectPage`: task manager projects
//! - `UserIdentity`: the logged-in user's profile record

pub mod project;
pub mod user;

pub use project::{NewProject, Project, ProjectPage};
pub use user::UserIdentity;
