use worker::{Env, Error, Result};

use crate::directory_db::SeaOrmUserDirectory;
use crate::registration::{system_clock, RegistrationConfig, VerificationProtocol};

use super::brevo::BrevoNotifier;
use super::db::db_connect;
use super::env::env_string;
use super::kv::KvPendingStore;

pub type Protocol = VerificationProtocol<KvPendingStore, SeaOrmUserDirectory, BrevoNotifier>;

pub fn load_config(env: &Env) -> Result<RegistrationConfig> {
    RegistrationConfig::from_lookup(|key| env_string(env, key))
        .map_err(|e| Error::RustError(e.to_string()))
}

/// Wire the protocol to this isolate's bindings. Built per request; Workers hold no
/// connection across requests.
pub async fn protocol(env: &Env) -> Result<Protocol> {
    let config = load_config(env)?;
    let clock = system_clock();

    let db = db_connect(env).await?;
    Ok(VerificationProtocol::new(
        config,
        clock.clone(),
        KvPendingStore::from_env(env)?,
        SeaOrmUserDirectory::new(db, clock),
        BrevoNotifier::from_env(env)?,
    ))
}
