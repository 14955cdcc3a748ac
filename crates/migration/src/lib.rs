pub use sea_orm_migration::prelude::*;

mod m20260201_000001_users;
mod m20260201_000002_users_role_index;

pub struct Migrator;

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260201_000001_users::Migration),
            Box::new(m20260201_000002_users_role_index::Migration),
        ]
    }
}
