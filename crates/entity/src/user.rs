use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Durable platform account, created when a registration is confirmed.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// UUIDv4 string.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Lowercased.
    #[sea_orm(unique)]
    pub email: String,

    /// Defaults to the email at sign-up.
    pub username: String,

    /// `user` or `moderator`.
    pub role: String,

    /// PBKDF2-SHA256 output; `None` for accounts without a password.
    #[serde(skip)]
    pub password_hash: Option<Vec<u8>>,

    #[serde(skip)]
    pub salt: Option<Vec<u8>>,

    pub password_iterations: i32,

    /// Unix timestamp (seconds).
    pub created_at: i64,

    /// Unix timestamp (seconds).
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
