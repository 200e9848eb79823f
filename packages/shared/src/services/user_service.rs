use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::models::user::{Requester, Role, User, UserUpdate};
use crate::repositories::errors::user_repository_errors::UserRepositoryError;
use crate::repositories::user_repository::UserRepository;
use crate::services::errors::user_service_errors::UserServiceError;
use crate::services::password::hash_password;

pub struct UserService {
    repository: Arc<dyn UserRepository>,
}

fn repository_error(e: UserRepositoryError) -> UserServiceError {
    match e {
        UserRepositoryError::NotFound => UserServiceError::UserNotFound,
        UserRepositoryError::AlreadyExists | UserRepositoryError::NicknameTaken => {
            UserServiceError::UserAlreadyExists
        }
        _ => UserServiceError::RepositoryError(e.to_string()),
    }
}

fn visible(user: User) -> Result<User, UserServiceError> {
    if user.is_deleted() {
        return Err(UserServiceError::UserNotFound);
    }
    Ok(user)
}

fn require_non_empty(field: &str, value: &str) -> Result<(), UserServiceError> {
    if value.trim().is_empty() {
        return Err(UserServiceError::ValidationError(format!(
            "{} cannot be empty",
            field
        )));
    }
    Ok(())
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        UserService { repository }
    }

    pub async fn create_user(
        &self,
        nickname: &str,
        first_name: &str,
        last_name: &str,
        password: &str,
    ) -> Result<User, UserServiceError> {
        if nickname.is_empty() || first_name.is_empty() || last_name.is_empty() || password.is_empty()
        {
            return Err(UserServiceError::ValidationError(
                "Nickname, first name, last name, or password cannot be empty".to_string(),
            ));
        }
        let user = User::new(
            nickname.to_string(),
            first_name.to_string(),
            last_name.to_string(),
            hash_password(password)?,
        );
        self.repository
            .create_user(&user)
            .await
            .map_err(repository_error)?;

        info!(user_id = %user.id, nickname = %user.nickname, "User created");
        Ok(user)
    }

    /// Deleted users are reported as not found.
    pub async fn get_user_by_id(&self, user_id: &str) -> Result<User, UserServiceError> {
        if user_id.is_empty() {
            return Err(UserServiceError::ValidationError(
                "User ID cannot be empty".to_string(),
            ));
        }
        self.repository
            .get_user_by_id(user_id)
            .await
            .map_err(repository_error)
            .and_then(visible)
    }

    pub async fn get_user_by_nickname(&self, nickname: &str) -> Result<User, UserServiceError> {
        if nickname.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Nickname cannot be empty".to_string(),
            ));
        }
        self.repository
            .get_user_by_nickname(nickname)
            .await
            .map_err(repository_error)
            .and_then(visible)
    }

    /// All users that are not deleted, ordered by nickname.
    pub async fn list_users(&self) -> Result<Vec<User>, UserServiceError> {
        let mut users: Vec<User> = self
            .repository
            .list_users()
            .await
            .map_err(repository_error)?
            .into_iter()
            .filter(|user| !user.is_deleted())
            .collect();
        users.sort_by(|a, b| a.nickname.cmp(&b.nickname).then_with(|| a.id.cmp(&b.id)));
        Ok(users)
    }

    pub async fn update_user(
        &self,
        requester: &Requester,
        user_id: &str,
        changes: UserUpdate,
    ) -> Result<User, UserServiceError> {
        if !requester.may_manage(user_id) {
            return Err(UserServiceError::PermissionDenied);
        }

        let mut user = self.get_user_by_id(user_id).await?;

        if let Some(nickname) = changes.nickname {
            require_non_empty("Nickname", &nickname)?;
            user.nickname = nickname;
        }
        if let Some(first_name) = changes.first_name {
            require_non_empty("First name", &first_name)?;
            user.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            require_non_empty("Last name", &last_name)?;
            user.last_name = last_name;
        }
        if let Some(password) = changes.password {
            require_non_empty("Password", &password)?;
            user.password = hash_password(&password)?;
        }
        user.updated_at = Some(Utc::now());

        self.repository
            .update_user(&user)
            .await
            .map_err(repository_error)?;

        debug!(user_id = %user.id, requester = %requester.user_id, "User updated");
        Ok(user)
    }

    pub async fn delete_user(
        &self,
        requester: &Requester,
        user_id: &str,
    ) -> Result<(), UserServiceError> {
        if user_id.is_empty() {
            return Err(UserServiceError::ValidationError(
                "User ID cannot be empty".to_string(),
            ));
        }
        if !requester.may_manage(user_id) {
            return Err(UserServiceError::PermissionDenied);
        }
        self.repository
            .delete_user(user_id, Utc::now())
            .await
            .map_err(repository_error)?;

        info!(user_id = %user_id, requester = %requester.user_id, "User deleted");
        Ok(())
    }

    pub async fn assign_role(
        &self,
        requester: &Requester,
        user_id: &str,
        role: Role,
    ) -> Result<User, UserServiceError> {
        if requester.role != Role::Admin {
            return Err(UserServiceError::PermissionDenied);
        }

        let mut user = self.get_user_by_id(user_id).await?;
        user.role = role;
        user.updated_at = Some(Utc::now());

        self.repository
            .update_user(&user)
            .await
            .map_err(repository_error)?;

        info!(user_id = %user.id, role = ?role, requester = %requester.user_id, "Role assigned");
        Ok(user)
    }
}
