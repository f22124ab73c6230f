//! Text rendering for command results.

use taskdo_core::models::{Project, UserIdentity};
use taskdo_core::SessionState;

/// Width of the name column in project listings
const NAME_WIDTH: usize = 32;

/// Truncate a string to a maximum length, adding ellipsis if needed
pub(crate) fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

pub(crate) fn project_row(project: &Project) -> String {
    format!(
        "{:>6}  {:<width$}  owner {}",
        project.id,
        truncate_string(&project.name, NAME_WIDTH),
        project.owner,
        width = NAME_WIDTH
    )
}

pub(crate) fn project_detail(project: &Project) -> String {
    let mut lines = vec![format!("#{} {}", project.id, project.name)];
    if !project.description.is_empty() {
        lines.push(project.description.clone());
    }
    lines.push(format!("Owner: {}", project.owner));
    if let Some(created) = project.created_at {
        lines.push(format!("Created: {}", created.format("%b %d, %Y")));
    }
    lines.join("\n")
}

pub(crate) fn identity(user: &UserIdentity) -> String {
    let mut lines = vec![format!("{} ({})", user.full_name(), user.username)];
    if !user.email.is_empty() {
        lines.push(format!("Email: {}", user.email));
    }
    if let Some(dob) = user.dob {
        lines.push(format!("Born: {}", dob.format("%b %d, %Y")));
    }
    if let Some(bio) = user.bio.as_deref().filter(|b| !b.is_empty()) {
        lines.push(bio.to_string());
    }
    lines.join("\n")
}

pub(crate) fn state(state: SessionState) -> &'static str {
    match state {
        SessionState::LoggedOut => "logged out",
        SessionState::PendingIdentity => "logged in (profile not loaded)",
        SessionState::Resolved => "logged in",
    }
}
