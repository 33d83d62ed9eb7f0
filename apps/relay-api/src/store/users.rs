use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::StoreError;

/// A chat user profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: String,
    pub name: String,
    pub email: String,
    #[serde(rename = "photoURL")]
    pub photo_url: String,
}

/// Abstraction over the user profile collection.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Insert a profile, or overwrite the existing one with the same `uid`.
    async fn upsert(
        &self,
        uid: &str,
        name: &str,
        email: &str,
        photo_url: &str,
    ) -> Result<User, StoreError>;

    /// Every profile except the caller's own, ordered by name.
    async fn list_excluding(&self, uid: &str) -> Result<Vec<User>, StoreError>;

    async fn get_by_uid(&self, uid: &str) -> Result<Option<User>, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation (for local runs / tests)
// ---------------------------------------------------------------------------

pub struct MemoryUserDirectory {
    rows: Mutex<HashMap<String, User>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn upsert(
        &self,
        uid: &str,
        name: &str,
        email: &str,
        photo_url: &str,
    ) -> Result<User, StoreError> {
        let user = User {
            uid: uid.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            photo_url: photo_url.to_string(),
        };
        self.rows
            .lock()
            .unwrap()
            .insert(uid.to_string(), user.clone());
        Ok(user)
    }

    async fn list_excluding(&self, uid: &str) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|u| u.uid != uid)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn get_by_uid(&self, uid: &str) -> Result<Option<User>, StoreError> {
        Ok(self.rows.lock().unwrap().get(uid).cloned())
    }
}
