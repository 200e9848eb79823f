use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    /// Moderators and admins may see who voted for whom.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct User {
    pub id: String,
    pub nickname: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Deleted users keep their row so votes they cast stay attributable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// `password` is expected to be already hashed.
    pub fn new(nickname: String, first_name: String, last_name: String, password: String) -> Self {
        User {
            id: Uuid::new_v4().to_string(),
            nickname,
            first_name,
            last_name,
            password,
            role: Role::User,
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// What other users get to see about a user.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct UserProfile {
    pub id: String,
    pub nickname: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        UserProfile {
            id: user.id,
            nickname: user.nickname,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Partial profile update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UserUpdate {
    pub nickname: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

/// The authenticated caller of a user-management operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub user_id: String,
    pub role: Role,
}

impl Requester {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Requester {
            user_id: user_id.into(),
            role,
        }
    }

    /// Self-service or an admin acting on someone else.
    pub fn may_manage(&self, user_id: &str) -> bool {
        self.user_id == user_id || self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_user() -> User {
        User::new(
            "tester".to_string(),
            "Test".to_string(),
            "User".to_string(),
            "hashed".to_string(),
        )
    }

    #[test]
    fn test_new_user_defaults() {
        let user = create_test_user();

        assert_eq!(user.nickname, "tester");
        assert_eq!(user.role, Role::User);
        assert!(user.updated_at.is_none());
        assert!(!user.id.is_empty());
        assert_ne!(user.id, create_test_user().id);
    }

    #[test]
    fn test_profile_hides_password() {
        let profile = UserProfile::from(create_test_user());
        let json = serde_json::to_string(&profile).unwrap();

        assert!(json.contains("tester"));
        assert!(!json.contains("hashed"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn test_role_privileges_and_wire_names() {
        assert!(!Role::User.is_privileged());
        assert!(Role::Moderator.is_privileged());
        assert!(Role::Admin.is_privileged());

        assert_eq!(serde_json::to_string(&Role::Moderator).unwrap(), "\"moderator\"");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn test_role_defaults_when_missing() {
        let json = r#"{
            "id": "u1",
            "nickname": "legacy",
            "first_name": "Old",
            "last_name": "Row",
            "password": "x",
            "created_at": "2024-01-01T00:00:00Z"
        }"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.role, Role::User);
        assert!(user.updated_at.is_none());
        assert!(!user.is_deleted());
    }

    #[test]
    fn test_deleted_at_round_trips() {
        let mut user = create_test_user();
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("deleted_at"));

        user.deleted_at = Some(Utc::now());
        let back: User = serde_json::from_str(&serde_json::to_string(&user).unwrap()).unwrap();
        assert!(back.is_deleted());
        assert!(!serde_json::to_string(&UserProfile::from(back))
            .unwrap()
            .contains("deleted_at"));
    }

    #[test]
    fn test_requester_may_manage() {
        let user = Requester::new("u-1", Role::User);
        let moderator = Requester::new("u-2", Role::Moderator);
        let admin = Requester::new("u-3", Role::Admin);

        assert!(user.may_manage("u-1"));
        assert!(!user.may_manage("u-2"));
        assert!(!moderator.may_manage("u-1"));
        assert!(admin.may_manage("u-1"));
    }
}
