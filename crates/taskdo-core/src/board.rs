//! In-memory project list mirroring the server.
//!
//! The board only changes after the server confirms a change: a project is
//! appended once created and removed once the delete succeeds. Deletes are
//! also checked against the current user before anything is sent.

use thiserror::Error;
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::auth::Session;
use crate::models::{NewProject, Project};

#[derive(Error, Debug)]
pub enum BoardError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Project {0} is not on the board")]
    UnknownProject(i64),

    #[error("Current user is not known yet - cannot check project ownership")]
    IdentityUnresolved,

    #[error("Project {project_id} belongs to user {owner}, not user {user}")]
    NotOwner { project_id: i64, owner: i64, user: i64 },
}

impl BoardError {
    pub fn user_message(&self) -> String {
        match self {
            BoardError::Api(e) => e.user_message(),
            BoardError::UnknownProject(id) => format!("No project with id {}", id),
            BoardError::IdentityUnresolved => {
                "Your profile has not loaded yet - try again in a moment".to_string()
            }
            BoardError::NotOwner { .. } => "Only the project owner can delete it".to_string(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ProjectBoard {
    projects: Vec<Project>,
}

impl ProjectBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn get(&self, id: i64) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Replace the board with the server's list. Returns the project count.
    pub async fn refresh(&mut self, session: &Session) -> Result<usize, BoardError> {
        let credential = session.require_credential()?;
        let projects = session.api().list_projects(credential).await?;
        debug!(count = projects.len(), "Project board refreshed");
        self.projects = projects;
        Ok(self.projects.len())
    }

    /// Fetch one project from the server and add or replace it on the board
    pub async fn fetch(&mut self, session: &Session, id: i64) -> Result<&Project, BoardError> {
        let credential = session.require_credential()?;
        let project = session.api().get_project(credential, id).await?;
        let position = match self.projects.iter().position(|p| p.id == id) {
            Some(position) => {
                self.projects[position] = project;
                position
            }
            None => {
                self.projects.push(project);
                self.projects.len() - 1
            }
        };
        Ok(&self.projects[position])
    }

    pub async fn create(
        &mut self,
        session: &Session,
        project: &NewProject,
    ) -> Result<&Project, BoardError> {
        let credential = session.require_credential()?;
        let created = session.api().create_project(credential, project).await?;
        debug!(id = created.id, "Project created");
        self.projects.push(created);
        Ok(&self.projects[self.projects.len() - 1])
    }

    /// Delete a project the current user owns and drop it from the board.
    ///
    /// Ownership is checked against the resolved identity before anything is
    /// sent to the server.
    pub async fn delete(&mut self, session: &Session, id: i64) -> Result<Project, BoardError> {
        let credential = session.require_credential()?;
        let owner = self
            .get(id)
            .map(|p| p.owner)
            .ok_or(BoardError::UnknownProject(id))?;
        let user = session
            .identity()
            .map(|u| u.id)
            .ok_or(BoardError::IdentityUnresolved)?;

        if owner != user {
            warn!(
                project_id = id,
                owner = owner,
                user = user,
                "Refusing to delete project owned by another user"
            );
            return Err(BoardError::NotOwner {
                project_id: id,
                owner,
                user,
            });
        }

        session.api().delete_project(credential, id).await?;

        let position = self
            .projects
            .iter()
            .position(|p| p.id == id)
            .ok_or(BoardError::UnknownProject(id))?;
        Ok(self.projects.remove(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use crate::auth::{Credential, MemoryTokenStore};

    fn project(id: i64, owner: i64) -> Project {
        Project {
            id,
            name: format!("Project {}", id),
            description: String::new(),
            owner,
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_unauthenticated_refresh_is_refused() {
        let api = ApiClient::new("http://127.0.0.1:9").expect("client");
        let session = Session::new(api, Box::new(MemoryTokenStore::default()));
        let mut board = ProjectBoard::new();

        let err = board.refresh(&session).await.unwrap_err();
        assert!(matches!(err, BoardError::Api(ApiError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_delete_unknown_or_unresolved_is_refused() {
        let api = ApiClient::new("http://127.0.0.1:9").expect("client");
        let store = MemoryTokenStore::with_credential(Credential::new("abc123").expect("token"));
        let session = Session::restore(api, Box::new(store));
        let mut board = ProjectBoard {
            projects: vec![project(1, 7)],
        };

        assert!(matches!(
            board.delete(&session, 99).await,
            Err(BoardError::UnknownProject(99))
        ));
        // Identity never resolved, so ownership cannot be checked
        assert!(matches!(
            board.delete(&session, 1).await,
            Err(BoardError::IdentityUnresolved)
        ));
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn test_not_owner_message() {
        let err = BoardError::NotOwner {
            project_id: 1,
            owner: 7,
            user: 9,
        };
        assert_eq!(err.to_string(), "Project 1 belongs to user 7, not user 9");
        assert_eq!(err.user_message(), "Only the project owner can delete it");
    }
}
