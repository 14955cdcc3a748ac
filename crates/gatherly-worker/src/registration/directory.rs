use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::crypto::PasswordHash;
use crate::util::uuid_v4;

use super::clock::SharedClock;
use super::error::ServiceError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Moderator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            other => Err(ServiceError::Unavailable(format!("unknown role {other:?}"))),
        }
    }
}

/// Durable user as seen by the registration flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: Role,
    /// `None` for accounts provisioned without a password.
    pub password: Option<PasswordHash>,
    pub created_at: i64,
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub role: Role,
    pub password: PasswordHash,
}

impl NewUser {
    /// A freshly promoted registration: username defaults to the email, role to `user`.
    pub fn promoted(email: &str, password: PasswordHash) -> Self {
        Self {
            email: email.to_string(),
            username: email.to_string(),
            role: Role::default(),
            password,
        }
    }
}

/// Durable user records. `create` must report an existing email as [`ServiceError::Duplicate`].
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait UserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, ServiceError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, ServiceError>;

    async fn create(&self, user: NewUser) -> Result<UserRecord, ServiceError>;
}

/// Process-local directory keyed by email, for tests and local development.
pub struct InMemoryUserDirectory {
    clock: SharedClock,
    users: Mutex<HashMap<String, UserRecord>>,
}

impl InMemoryUserDirectory {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            users: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.users.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.lock().is_empty()
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, ServiceError> {
        Ok(self.users.lock().get(email).cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, ServiceError> {
        Ok(self.users.lock().values().find(|u| u.id == id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<UserRecord, ServiceError> {
        let mut users = self.users.lock();
        if users.contains_key(&user.email) {
            return Err(ServiceError::Duplicate);
        }

        let record = UserRecord {
            id: uuid_v4(),
            email: user.email.clone(),
            username: user.username,
            role: user.role,
            password: Some(user.password),
            created_at: self.clock.now_ts(),
        };
        users.insert(user.email, record.clone());
        Ok(record)
    }
}
