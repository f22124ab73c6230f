use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Profile record of the authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserIdentity {
    #[serde(rename = "user__id", alias = "id")]
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl UserIdentity {
    /// "First Last", or the username when no name is on file
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string();
        if name.is_empty() {
            self.username.clone()
        } else {
            name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_profile_data() {
        let json = r#"{"user__id":9,"username":"jdoe","first_name":"Jane","last_name":"Doe","email":"jane@example.com","dob":"1990-04-12","bio":null,"image":"https://cdn.example.com/jdoe.png","state":1}"#;

        let user: UserIdentity = serde_json::from_str(json).expect("Failed to parse profile JSON");
        assert_eq!(user.id, 9);
        assert_eq!(user.username, "jdoe");
        assert_eq!(user.dob, NaiveDate::from_ymd_opt(1990, 4, 12));
        assert!(user.bio.is_none());
        assert_eq!(user.image.as_deref(), Some("https://cdn.example.com/jdoe.png"));
        assert_eq!(user.full_name(), "Jane Doe");
    }

    #[test]
    fn test_plain_id_alias_and_sparse_fields() {
        let user: UserIdentity =
            serde_json::from_str(r#"{"id":4,"username":"solo"}"#).expect("parse");
        assert_eq!(user.id, 4);
        assert_eq!(user.email, "");
        assert!(user.dob.is_none());
        assert_eq!(user.full_name(), "solo");
    }
}
