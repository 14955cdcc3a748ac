use std::fmt::Display;

use tracing::error;
use worker::{Request, Response, Result};

use crate::registration::RegistrationError;

const ALLOW_METHODS: &str = "GET,POST,OPTIONS";
const ALLOW_HEADERS: &str = "Authorization,Content-Type,Accept";

/// Copy CORS headers onto `resp`, echoing the caller's Origin (or `*`).
pub fn json_with_cors(req: &Request, mut resp: Response) -> Result<Response> {
    let origin = req.headers().get("Origin")?;

    let headers = resp.headers_mut();
    headers.set("Access-Control-Allow-Origin", origin.as_deref().unwrap_or("*"))?;
    headers.set("Vary", "Origin")?;
    headers.set("Access-Control-Allow-Credentials", "true")?;
    headers.set("Access-Control-Allow-Methods", ALLOW_METHODS)?;
    headers.set("Access-Control-Allow-Headers", ALLOW_HEADERS)?;

    Ok(resp)
}

pub fn error_response(req: &Request, status: u16, code: &str, message: &str) -> Result<Response> {
    let body = serde_json::json!({
        "success": false,
        "error": { "code": code, "message": message },
    });
    json_with_cors(req, Response::from_json(&body)?.with_status(status))
}

pub fn internal_error_response<E: Display>(req: &Request, context: &str, err: &E) -> Result<Response> {
    error!(error = %err, "{context}");
    error_response(req, 500, "internal_error", "Internal server error")
}

/// Status for each protocol failure. Transient failures are logged with the
/// collaborator's message but answered generically.
pub fn registration_error_response(req: &Request, err: &RegistrationError) -> Result<Response> {
    let (status, message) = match err {
        RegistrationError::Conflict => (409, err.to_string()),
        RegistrationError::Unauthorized(msg) => (401, msg.to_string()),
        RegistrationError::InvalidInput(msg) => (400, msg.to_string()),
        RegistrationError::Transient { service, message } => {
            error!(%service, %message, "registration collaborator failed");
            (503, "Service temporarily unavailable".to_string())
        }
    };
    error_response(req, status, err.code(), &message)
}

pub fn not_found(req: &Request) -> Result<Response> {
    error_response(req, 404, "not_found", "Not found")
}
