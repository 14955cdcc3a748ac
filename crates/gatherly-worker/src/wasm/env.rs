use worker::Env;

use crate::registration::config::normalize_env_value;

/// Read a plain var or, failing that, a secret binding.
pub fn env_string(env: &Env, key: &str) -> Option<String> {
    env.var(key)
        .map(|v| v.to_string())
        .or_else(|_| env.secret(key).map(|v| v.to_string()))
        .ok()
        .map(normalize_env_value)
        .filter(|s| !s.is_empty())
}
