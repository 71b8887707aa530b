use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DatabaseError, SupabaseClient};
use shared_models::user::User;

const USER_COLUMNS: &str = "id,username,email,name,phone,role,specialization,medical_history,created_at";

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("User not found: {0}")]
    NotFound(Uuid),

    #[error("Directory backend error: {0}")]
    Backend(String),
}

impl From<DatabaseError> for DirectoryError {
    fn from(err: DatabaseError) -> Self {
        DirectoryError::Backend(err.to_string())
    }
}

/// Read access to identity records owned by the auth provider.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, user_id: Uuid) -> Result<User, DirectoryError>;

    async fn list_doctors(&self) -> Result<Vec<User>, DirectoryError>;
}

#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_user(&self, user_id: Uuid) -> Result<User, DirectoryError> {
        self.users
            .read()
            .await
            .get(&user_id)
            .cloned()
            .ok_or(DirectoryError::NotFound(user_id))
    }

    async fn list_doctors(&self) -> Result<Vec<User>, DirectoryError> {
        let mut doctors: Vec<User> = self
            .users
            .read()
            .await
            .values()
            .filter(|user| user.is_doctor())
            .cloned()
            .collect();
        doctors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(doctors)
    }
}

pub struct SupabaseUserDirectory {
    supabase: Arc<SupabaseClient>,
    access_key: String,
}

impl SupabaseUserDirectory {
    pub fn new(supabase: Arc<SupabaseClient>, config: &AppConfig) -> Self {
        Self {
            supabase,
            access_key: config.store_access_key().to_string(),
        }
    }

    fn parse_users(rows: Vec<Value>) -> Result<Vec<User>, DirectoryError> {
        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<User>, _>>()
            .map_err(|e| DirectoryError::Backend(format!("Failed to parse users: {}", e)))
    }
}

#[async_trait]
impl UserDirectory for SupabaseUserDirectory {
    async fn get_user(&self, user_id: Uuid) -> Result<User, DirectoryError> {
        debug!("Fetching user {}", user_id);

        let path = format!("/rest/v1/users?id=eq.{}&select={}", user_id, USER_COLUMNS);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(&self.access_key), None)
            .await?;

        Self::parse_users(rows)?
            .into_iter()
            .next()
            .ok_or(DirectoryError::NotFound(user_id))
    }

    async fn list_doctors(&self) -> Result<Vec<User>, DirectoryError> {
        let path = format!("/rest/v1/users?role=eq.doctor&select={}&order=name.asc", USER_COLUMNS);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(&self.access_key), None)
            .await?;

        Self::parse_users(rows)
    }
}
