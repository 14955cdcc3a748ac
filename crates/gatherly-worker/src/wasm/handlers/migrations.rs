use migration::{Migrator, MigratorTrait};
use sea_orm::{DatabaseConnection, DbErr};
use tracing::info;
use worker::{Env, Request, Response, Result};

use crate::worker_wasm::db::db_connect;
use crate::worker_wasm::http::{internal_error_response, json_with_cors};

use super::admin_auth::ensure_admin_authorized;

/// `POST /v1/admin/migrations/up`: bring the `users` schema up to date.
///
/// The schema is small enough to apply in one request; the response names what ran.
pub async fn handle_migrations_up(req: &Request, env: &Env) -> Result<Response> {
    if let Some(resp) = ensure_admin_authorized(req, env)? {
        return Ok(resp);
    }

    let db = match db_connect(env).await {
        Ok(db) => db,
        Err(e) => return internal_error_response(req, "Failed to open libSQL connection", &e),
    };

    let applied = match apply_pending(&db).await {
        Ok(names) => names,
        Err(e) => return internal_error_response(req, "Schema migration failed", &e),
    };
    info!(count = applied.len(), "schema migrations applied");

    let resp = Response::from_json(&serde_json::json!({
        "success": true,
        "applied": applied,
    }))?;
    json_with_cors(req, resp)
}

async fn apply_pending(db: &DatabaseConnection) -> std::result::Result<Vec<String>, DbErr> {
    let names: Vec<String> = Migrator::get_pending_migrations(db)
        .await?
        .iter()
        .map(|m| m.name().to_string())
        .collect();

    if !names.is_empty() {
        Migrator::up(db, None).await?;
    }
    Ok(names)
}
