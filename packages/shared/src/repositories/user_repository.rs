//! Users live in one table keyed by `id`. Each nickname is also claimed by a
//! marker item (`id` = [`NICKNAME_CLAIM_PREFIX`] + nickname) written in the
//! same transaction as the user, so two registrations can never share one.

use crate::models::user::User;
use crate::repositories::errors::user_repository_errors::UserRepositoryError;
use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{AttributeValue, Delete, Put, TransactWriteItem};
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_dynamo::{from_item, to_attribute_value, to_item};

#[cfg(test)]
use mockall::automock;

const NICKNAME_INDEX: &str = "GSI_UserByNickname";
pub const NICKNAME_CLAIM_PREFIX: &str = "nickname#";

#[derive(Serialize)]
struct NicknameClaim<'a> {
    id: String,
    owner_id: &'a str,
}

impl<'a> NicknameClaim<'a> {
    fn new(nickname: &str, owner_id: &'a str) -> Self {
        NicknameClaim {
            id: claim_id(nickname),
            owner_id,
        }
    }
}

fn claim_id(nickname: &str) -> String {
    format!("{}{}", NICKNAME_CLAIM_PREFIX, nickname)
}

fn serialization_error(e: impl std::fmt::Display) -> UserRepositoryError {
    UserRepositoryError::Serialization(e.to_string())
}

fn build_error(e: impl std::fmt::Display) -> UserRepositoryError {
    UserRepositoryError::DynamoDb(e.to_string())
}

/// Index of the transaction item whose condition failed, if that is why the
/// transaction was cancelled.
fn failed_condition<R: std::fmt::Debug>(
    err: &SdkError<TransactWriteItemsError, R>,
) -> Option<usize> {
    if let SdkError::ServiceError(service_err) = err {
        if let TransactWriteItemsError::TransactionCanceledException(cancelled) = service_err.err()
        {
            return cancelled
                .cancellation_reasons()
                .iter()
                .position(|reason| reason.code() == Some("ConditionalCheckFailed"));
        }
    }
    None
}

pub struct DynamoDbUserRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbUserRepository {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    async fn query_by_nickname(&self, nickname: &str) -> Result<Option<User>, UserRepositoryError> {
        let output = self
            .client
            .query()
            .table_name(&self.table_name)
            .index_name(NICKNAME_INDEX)
            .key_condition_expression("nickname = :nickname")
            .expression_attribute_values(
                ":nickname",
                to_attribute_value(nickname).map_err(serialization_error)?,
            )
            .send()
            .await
            .map_err(|e| UserRepositoryError::DynamoDb(e.to_string()))?;

        match output.items.and_then(|items| items.into_iter().next()) {
            Some(item) => {
                let user = from_item(item).map_err(serialization_error)?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    fn claim_put(
        &self,
        nickname: &str,
        owner_id: &str,
    ) -> Result<TransactWriteItem, UserRepositoryError> {
        let item = to_item(NicknameClaim::new(nickname, owner_id)).map_err(serialization_error)?;
        let put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(id)")
            .build()
            .map_err(build_error)?;
        Ok(TransactWriteItem::builder().put(put).build())
    }

    async fn rename(&self, user: &User, old_nickname: &str) -> Result<(), UserRepositoryError> {
        let user_put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(to_item(user).map_err(serialization_error)?))
            .condition_expression("attribute_exists(id) AND nickname = :old_nickname")
            .expression_attribute_values(
                ":old_nickname",
                AttributeValue::S(old_nickname.to_string()),
            )
            .build()
            .map_err(build_error)?;
        let release = Delete::builder()
            .table_name(&self.table_name)
            .key("id", AttributeValue::S(claim_id(old_nickname)))
            .build()
            .map_err(build_error)?;

        let result = self
            .client
            .transact_write_items()
            .transact_items(TransactWriteItem::builder().put(user_put).build())
            .transact_items(TransactWriteItem::builder().delete(release).build())
            .transact_items(self.claim_put(&user.nickname, &user.id)?)
            .send()
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => Err(match failed_condition(&e) {
                Some(0) => UserRepositoryError::NotFound,
                Some(_) => UserRepositoryError::NicknameTaken,
                None => UserRepositoryError::DynamoDb(e.to_string()),
            }),
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `NicknameTaken` if any user, deleted or not, holds the
    /// nickname.
    async fn create_user(&self, user: &User) -> Result<(), UserRepositoryError>;
    /// Returns deleted users too; callers decide whether they are visible.
    async fn get_user_by_id(&self, user_id: &str) -> Result<User, UserRepositoryError>;
    async fn get_user_by_nickname(&self, nickname: &str) -> Result<User, UserRepositoryError>;
    async fn list_users(&self) -> Result<Vec<User>, UserRepositoryError>;
    async fn update_user(&self, user: &User) -> Result<(), UserRepositoryError>;
    /// Marks the user deleted. `NotFound` if there is no such user or it is
    /// already deleted.
    async fn delete_user(
        &self,
        user_id: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<(), UserRepositoryError>;
}

#[async_trait]
impl UserRepository for DynamoDbUserRepository {
    async fn create_user(&self, user: &User) -> Result<(), UserRepositoryError> {
        let user_put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(to_item(user).map_err(serialization_error)?))
            .condition_expression("attribute_not_exists(id)")
            .build()
            .map_err(build_error)?;
        let result = self
            .client
            .transact_write_items()
            .transact_items(TransactWriteItem::builder().put(user_put).build())
            .transact_items(self.claim_put(&user.nickname, &user.id)?)
            .send()
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => Err(match failed_condition(&e) {
                Some(0) => UserRepositoryError::AlreadyExists,
                Some(_) => UserRepositoryError::NicknameTaken,
                None => UserRepositoryError::DynamoDb(e.to_string()),
            }),
        }
    }

    async fn get_user_by_id(&self, user_id: &str) -> Result<User, UserRepositoryError> {
        if user_id.starts_with(NICKNAME_CLAIM_PREFIX) {
            return Err(UserRepositoryError::NotFound);
        }
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(
                "id",
                to_attribute_value(user_id).map_err(serialization_error)?,
            )
            .send()
            .await
            .map_err(|e| UserRepositoryError::DynamoDb(e.to_string()))?;
        if let Some(item) = output.item {
            let user: User = from_item(item).map_err(serialization_error)?;
            Ok(user)
        } else {
            Err(UserRepositoryError::NotFound)
        }
    }

    async fn get_user_by_nickname(&self, nickname: &str) -> Result<User, UserRepositoryError> {
        self.query_by_nickname(nickname)
            .await?
            .ok_or(UserRepositoryError::NotFound)
    }

    async fn list_users(&self) -> Result<Vec<User>, UserRepositoryError> {
        let mut users = Vec::new();
        let mut start_key = None;
        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression("attribute_not_exists(owner_id)")
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| UserRepositoryError::DynamoDb(e.to_string()))?;
            for item in output.items.unwrap_or_default() {
                let user: User = from_item(item).map_err(serialization_error)?;
                users.push(user);
            }
            start_key = output.last_evaluated_key;
            if start_key.is_none() {
                break;
            }
        }
        Ok(users)
    }

    async fn update_user(&self, user: &User) -> Result<(), UserRepositoryError> {
        let current = self.get_user_by_id(&user.id).await?;
        if current.nickname != user.nickname {
            return self.rename(user, &current.nickname).await;
        }

        let item = to_item(user).map_err(serialization_error)?;
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_exists(id)")
            .send()
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if let SdkError::ServiceError(service_err) = &e {
                    if service_err.err().is_conditional_check_failed_exception() {
                        return Err(UserRepositoryError::NotFound);
                    }
                }
                Err(UserRepositoryError::DynamoDb(e.to_string()))
            }
        }
    }

    async fn delete_user(
        &self,
        user_id: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<(), UserRepositoryError> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key(
                "id",
                to_attribute_value(user_id).map_err(serialization_error)?,
            )
            .update_expression("SET deleted_at = :deleted_at")
            .condition_expression("attribute_exists(id) AND attribute_not_exists(deleted_at)")
            .expression_attribute_values(
                ":deleted_at",
                to_attribute_value(deleted_at).map_err(serialization_error)?,
            )
            .send()
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if let SdkError::ServiceError(service_err) = &e {
                    if service_err.err().is_conditional_check_failed_exception() {
                        return Err(UserRepositoryError::NotFound);
                    }
                }
                Err(UserRepositoryError::DynamoDb(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_nickname_claim_item_shape() {
        let item: HashMap<String, AttributeValue> =
            to_item(NicknameClaim::new("alice", "u-1")).unwrap();

        assert_eq!(
            item.get("id"),
            Some(&AttributeValue::S("nickname#alice".to_string()))
        );
        assert_eq!(item.get("owner_id"), Some(&AttributeValue::S("u-1".to_string())));
        assert!(!item.contains_key("nickname"), "Claims must stay out of the nickname index");
    }
}
