use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use worker::{Env, Error, Result};

use super::env::env_string;

/// Open the `users` database for this request.
pub async fn db_connect(env: &Env) -> Result<DatabaseConnection> {
    let Some(url) = env_string(env, "LIBSQL_URL") else {
        return Err(Error::RustError("LIBSQL_URL is required".to_string()));
    };

    let mut options = ConnectOptions::new(url);
    if let Some(token) = env_string(env, "LIBSQL_AUTH_TOKEN") {
        options.libsql_auth_token(token);
    }
    options
        .max_connections(1)
        .min_connections(0)
        .connect_timeout(Duration::from_secs(5))
        .acquire_timeout(Duration::from_secs(5))
        .sqlx_logging(false);

    Database::connect(options)
        .await
        .map_err(|e| Error::RustError(format!("users database: {e}")))
}
