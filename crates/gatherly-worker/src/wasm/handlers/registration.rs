use serde::Deserialize;
use worker::{Env, Request, Response, Result};

use crate::registration::SessionCredential;
use crate::worker_wasm::http::{
    error_response, internal_error_response, json_with_cors, registration_error_response,
};
use crate::worker_wasm::state::protocol;

use super::admin_auth::extract_bearer_token;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsData {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
struct ConfirmData {
    code: String,
}

pub fn session_json(session: &SessionCredential) -> serde_json::Value {
    serde_json::json!({
        "accessToken": session.token,
        "tokenType": "Bearer",
        "expiresIn": session.expires_in,
        "role": session.claims.role,
    })
}

/// `POST /api/auth/register`: start a sign-up and hand back the temporary credential.
pub async fn handle_register(mut req: Request, env: &Env) -> Result<Response> {
    let payload: CredentialsData = match req.json().await {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "invalid JSON in register");
            return error_response(&req, 400, "invalid_json", "Invalid JSON body");
        }
    };

    let protocol = match protocol(env).await {
        Ok(p) => p,
        Err(e) => return internal_error_response(&req, "Failed to initialize registration", &e),
    };

    match protocol.initiate(&payload.email, &payload.password).await {
        Ok(temporary) => {
            let resp = Response::from_json(&serde_json::json!({
                "temporaryToken": temporary.token,
                "expiresIn": temporary.expires_in,
            }))?
            .with_status(201);
            json_with_cors(&req, resp)
        }
        Err(e) => registration_error_response(&req, &e),
    }
}

/// `POST /api/auth/register/confirm`: bearer temporary credential plus `{ "code" }`.
pub async fn handle_register_confirm(mut req: Request, env: &Env) -> Result<Response> {
    let Some(token) = extract_bearer_token(&req)? else {
        return error_response(&req, 401, "unauthorized", "invalid or expired token");
    };

    let payload: ConfirmData = match req.json().await {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "invalid JSON in register confirm");
            return error_response(&req, 400, "invalid_json", "Invalid JSON body");
        }
    };

    let protocol = match protocol(env).await {
        Ok(p) => p,
        Err(e) => return internal_error_response(&req, "Failed to initialize registration", &e),
    };

    match protocol.confirm(payload.code.trim(), &token).await {
        Ok(session) => json_with_cors(&req, Response::from_json(&session_json(&session))?),
        Err(e) => registration_error_response(&req, &e),
    }
}

/// `POST /api/auth/register/resend`: bearer temporary credential, no body.
pub async fn handle_register_resend(req: Request, env: &Env) -> Result<Response> {
    let Some(token) = extract_bearer_token(&req)? else {
        return error_response(&req, 401, "unauthorized", "invalid or expired token");
    };

    let protocol = match protocol(env).await {
        Ok(p) => p,
        Err(e) => return internal_error_response(&req, "Failed to initialize registration", &e),
    };

    match protocol.resend(&token).await {
        Ok(()) => json_with_cors(&req, Response::from_json(&serde_json::json!({ "success": true }))?),
        Err(e) => registration_error_response(&req, &e),
    }
}
