//! Command handlers. Each one drives the session and project board and
//! prints the result; failures come back as user-facing messages.

use std::io::{self, Write};

use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use tracing::{debug, warn};

use taskdo_core::auth::SessionError;
use taskdo_core::board::BoardError;
use taskdo_core::models::NewProject;
use taskdo_core::{ApiError, Config, ProjectBoard, Session};

use crate::cli::ProjectCommands;
use crate::output;

/// Maximum length for username input (Django's username limit)
const MAX_USERNAME_LENGTH: usize = 150;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Errors that carry a message meant for the person at the terminal
trait UserMessage: std::fmt::Display {
    fn user_message(&self) -> String;
}

macro_rules! impl_user_message {
    ($($ty:ty),*) => {
        $(impl UserMessage for $ty {
            fn user_message(&self) -> String {
                <$ty>::user_message(self)
            }
        })*
    };
}

impl_user_message!(ApiError, SessionError, BoardError);

trait UserFacing<T> {
    fn user_facing(self) -> Result<T>;
}

impl<T, E: UserMessage> UserFacing<T> for std::result::Result<T, E> {
    fn user_facing(self) -> Result<T> {
        self.map_err(|e| {
            debug!(error = %e, "Command failed");
            anyhow!(e.user_message())
        })
    }
}

/// Output settings shared by every command
pub(crate) struct Printer {
    pub(crate) json: bool,
}

impl Printer {
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", text());
        }
        Ok(())
    }
}

// =========================================================================
// Authentication
// =========================================================================

pub(crate) async fn login(
    session: &mut Session,
    config: &mut Config,
    username: Option<String>,
    printer: &Printer,
) -> Result<()> {
    let username = match username.or_else(|| std::env::var("TASKDO_USERNAME").ok()) {
        Some(username) if !username.trim().is_empty() => username.trim().to_string(),
        _ => prompt_username(config.last_username.as_deref())?,
    };

    let password = match std::env::var("TASKDO_PASSWORD") {
        Ok(password) if !password.is_empty() => password,
        _ => rpassword::prompt_password("Password: ")?,
    };

    validate_login_input(&username, &password)?;

    session.login(&username, &password).await.user_facing()?;

    config.last_username = Some(username);
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }

    match session.identity() {
        Some(user) => printer.emit(user, || format!("Logged in as {}", user.full_name())),
        None => {
            let report = StatusReport {
                state: output::state(session.state()),
                username: None,
                base_url: session.api().base_url(),
            };
            printer.emit(&report, || {
                "Logged in. Your profile could not be loaded yet.".to_string()
            })
        }
    }
}

fn prompt_username(last_username: Option<&str>) -> Result<String> {
    match last_username {
        Some(last) => print!("Username [{}]: ", last),
        None => print!("Username: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    Ok(match (input.is_empty(), last_username) {
        (true, Some(last)) => last.to_string(),
        _ => input.to_string(),
    })
}

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

fn validate_login_input(username: &str, password: &str) -> Result<()> {
    if username.is_empty() || password.is_empty() {
        bail!("Username and password required");
    }
    if username.chars().count() > MAX_USERNAME_LENGTH
        || !username.chars().all(is_valid_input_char)
    {
        bail!("Invalid username");
    }
    if password.chars().count() > MAX_PASSWORD_LENGTH
        || !password.chars().all(is_valid_input_char)
    {
        bail!("Invalid password");
    }
    Ok(())
}

pub(crate) fn logout(session: &mut Session) -> Result<()> {
    let was_authenticated = session.is_authenticated();
    session.logout().user_facing()?;
    if was_authenticated {
        println!("Logged out");
    } else {
        println!("Not logged in");
    }
    Ok(())
}

pub(crate) async fn whoami(session: &mut Session, printer: &Printer) -> Result<()> {
    session.require_credential().user_facing()?;
    match session.resolve_identity().await {
        Some(user) => printer.emit(user, || output::identity(user)),
        None => bail!("Could not load your profile - your session may have expired"),
    }
}

#[derive(Serialize)]
struct StatusReport<'a> {
    state: &'a str,
    username: Option<&'a str>,
    base_url: &'a str,
}

pub(crate) fn status(session: &Session, printer: &Printer) -> Result<()> {
    let report = StatusReport {
        state: output::state(session.state()),
        username: session.identity().map(|user| user.username.as_str()),
        base_url: session.api().base_url(),
    };
    printer.emit(&report, || match report.username {
        Some(username) => format!("{} as {} ({})", report.state, username, report.base_url),
        None => format!("{} ({})", report.state, report.base_url),
    })
}

// =========================================================================
// Projects
// =========================================================================

pub(crate) async fn project(
    session: &mut Session,
    action: ProjectCommands,
    printer: &Printer,
) -> Result<()> {
    match action {
        ProjectCommands::List { all } => list_projects(session, all, printer).await,
        ProjectCommands::Get { ids } => get_projects(session, &ids, printer).await,
        ProjectCommands::Create { name, description } => {
            let mut board = ProjectBoard::new();
            let created = board
                .create(session, &NewProject::new(name, description))
                .await
                .user_facing()?;
            printer.emit(created, || format!("Created project #{}", created.id))
        }
        ProjectCommands::Delete { id } => delete_project(session, id, printer).await,
    }
}

async fn list_projects(session: &Session, all: bool, printer: &Printer) -> Result<()> {
    let projects = if all {
        let credential = session.require_credential().user_facing()?;
        session.api().list_all_projects(credential).await.user_facing()?
    } else {
        let mut board = ProjectBoard::new();
        board.refresh(session).await.user_facing()?;
        board.projects().to_vec()
    };

    printer.emit(&projects, || {
        if projects.is_empty() {
            "No projects".to_string()
        } else {
            projects
                .iter()
                .map(output::project_row)
                .collect::<Vec<_>>()
                .join("\n")
        }
    })
}

/// Fetch several projects at once; read-only, so the requests run concurrently
async fn get_projects(session: &Session, ids: &[i64], printer: &Printer) -> Result<()> {
    let credential = session.require_credential().user_facing()?;
    let requests = ids.iter().map(|&id| session.api().get_project(credential, id));
    let results = futures::future::join_all(requests).await;

    let mut projects = Vec::new();
    let mut failures = 0;
    for (id, result) in ids.iter().zip(results) {
        match result {
            Ok(project) => projects.push(project),
            Err(e) => {
                failures += 1;
                eprintln!("Project {}: {}", id, e.user_message());
            }
        }
    }

    printer.emit(&projects, || {
        projects
            .iter()
            .map(output::project_detail)
            .collect::<Vec<_>>()
            .join("\n\n")
    })?;

    if failures > 0 {
        bail!("{} of {} projects could not be loaded", failures, ids.len());
    }
    Ok(())
}

async fn delete_project(session: &mut Session, id: i64, printer: &Printer) -> Result<()> {
    session.require_credential().user_facing()?;
    if session.resolve_identity().await.is_none() {
        bail!("Could not load your profile - your session may have expired");
    }

    let mut board = ProjectBoard::new();
    board.fetch(session, id).await.user_facing()?;
    let removed = board.delete(session, id).await.user_facing()?;
    printer.emit(&removed, || format!("Deleted project #{} {}", removed.id, removed.name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_login_input() {
        assert!(validate_login_input("jdoe", "secret").is_ok());
        assert!(validate_login_input("", "secret").is_err());
        assert!(validate_login_input("jdoe", "").is_err());
        assert!(validate_login_input(&"u".repeat(151), "secret").is_err());
        assert!(validate_login_input("jdoe", &"p".repeat(129)).is_err());
        // Control characters rejected
        assert!(validate_login_input("jd\x00oe", "secret").is_err());
        assert!(validate_login_input("jdoe", "sec\nret").is_err());
    }

    #[test]
    fn test_user_facing_uses_user_message() {
        let result: std::result::Result<(), ApiError> = Err(ApiError::Unauthenticated);
        let err = result.user_facing().unwrap_err();
        assert_eq!(err.to_string(), "You are not logged in");
    }
}
