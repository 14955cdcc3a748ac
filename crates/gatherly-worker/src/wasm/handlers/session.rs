use worker::{Env, Request, Response, Result};

use crate::worker_wasm::http::{
    error_response, internal_error_response, json_with_cors, registration_error_response,
};
use crate::worker_wasm::state::protocol;

use super::admin_auth::extract_bearer_token;
use super::registration::{session_json, CredentialsData};

/// `POST /api/auth/login`: password sign-in for confirmed users.
pub async fn handle_login(mut req: Request, env: &Env) -> Result<Response> {
    let payload: CredentialsData = match req.json().await {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "invalid JSON in login");
            return error_response(&req, 400, "invalid_json", "Invalid JSON body");
        }
    };

    let protocol = match protocol(env).await {
        Ok(p) => p,
        Err(e) => return internal_error_response(&req, "Failed to initialize registration", &e),
    };

    match protocol.sign_in(&payload.email, &payload.password).await {
        Ok(session) => json_with_cors(&req, Response::from_json(&session_json(&session))?),
        Err(e) => registration_error_response(&req, &e),
    }
}

/// `GET /api/users/me`: the user behind the session bearer token.
pub async fn handle_me(req: Request, env: &Env) -> Result<Response> {
    let Some(token) = extract_bearer_token(&req)? else {
        return error_response(&req, 401, "unauthorized", "Missing bearer token");
    };

    let protocol = match protocol(env).await {
        Ok(p) => p,
        Err(e) => return internal_error_response(&req, "Failed to initialize registration", &e),
    };

    match protocol.authenticate(&token).await {
        Ok(user) => {
            let resp = Response::from_json(&serde_json::json!({
                "id": user.id,
                "email": user.email,
                "username": user.username,
                "role": user.role,
                "createdAt": user.created_at,
            }))?;
            json_with_cors(&req, resp)
        }
        Err(e) => registration_error_response(&req, &e),
    }
}
