use std::num::NonZeroU32;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    SqlErr,
};

use entity::user;

use crate::crypto::PasswordHash;
use crate::registration::{NewUser, Role, ServiceError, SharedClock, UserDirectory, UserRecord};
use crate::util::uuid_v4;

fn map_db_err(e: DbErr) -> ServiceError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::Duplicate,
        _ => ServiceError::unavailable(e),
    }
}

fn to_record(model: user::Model) -> Result<UserRecord, ServiceError> {
    let role: Role = model.role.parse()?;

    let iterations = u32::try_from(model.password_iterations)
        .ok()
        .and_then(NonZeroU32::new);
    let password = match (model.password_hash, model.salt, iterations) {
        (Some(hash), Some(salt), Some(iterations)) if !hash.is_empty() => Some(PasswordHash {
            hash,
            salt,
            iterations,
        }),
        _ => None,
    };

    Ok(UserRecord {
        id: model.id,
        email: model.email,
        username: model.username,
        role,
        password,
        created_at: model.created_at,
    })
}

/// [`UserDirectory`] over the `users` table.
pub struct SeaOrmUserDirectory {
    db: DatabaseConnection,
    clock: SharedClock,
}

impl SeaOrmUserDirectory {
    pub fn new(db: DatabaseConnection, clock: SharedClock) -> Self {
        Self { db, clock }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl UserDirectory for SeaOrmUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, ServiceError> {
        user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await
            .map_err(map_db_err)?
            .map(to_record)
            .transpose()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, ServiceError> {
        user::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(map_db_err)?
            .map(to_record)
            .transpose()
    }

    async fn create(&self, new_user: NewUser) -> Result<UserRecord, ServiceError> {
        // The unique index is the real guard; this keeps the common case off the error path.
        if self.find_by_email(&new_user.email).await?.is_some() {
            return Err(ServiceError::Duplicate);
        }

        let now = self.clock.now_ts();
        let iterations = i32::try_from(new_user.password.iterations.get())
            .map_err(ServiceError::unavailable)?;

        let active = user::ActiveModel {
            id: Set(uuid_v4()),
            email: Set(new_user.email),
            username: Set(new_user.username),
            role: Set(new_user.role.as_str().to_string()),
            password_hash: Set(Some(new_user.password.hash)),
            salt: Set(Some(new_user.password.salt)),
            password_iterations: Set(iterations),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = active.insert(&self.db).await.map_err(map_db_err)?;
        to_record(model)
    }
}
