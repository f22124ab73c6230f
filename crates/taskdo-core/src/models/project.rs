use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A project as returned by the task manager endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Project {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// User id of the project owner
    pub owner: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.owner == user_id
    }
}

/// Payload for creating a project. The server assigns id and owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct NewProject {
    pub name: String,
    pub description: String,
}

impl NewProject {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Paginated list envelope. `results` keeps the server's order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectPage {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<Project>,
}
