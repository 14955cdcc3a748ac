use worker::*;

#[path = "wasm/brevo.rs"]
pub mod brevo;
#[path = "wasm/db/mod.rs"]
pub mod db;
#[path = "wasm/env.rs"]
pub mod env;
#[path = "wasm/handlers/mod.rs"]
pub mod handlers;
#[path = "wasm/http.rs"]
pub mod http;
#[path = "wasm/kv.rs"]
pub mod kv;
#[path = "wasm/logging.rs"]
pub mod logging;
#[path = "wasm/state.rs"]
pub mod state;

use http::{json_with_cors, not_found};

#[event(start)]
fn start() {
    logging::init();
}

#[event(fetch)]
pub async fn fetch(req: Request, env: Env, _ctx: Context) -> Result<Response> {
    console_error_panic_hook::set_once();

    if req.method() == Method::Options {
        let resp = Response::empty()?.with_status(204);
        return json_with_cors(&req, resp);
    }

    let url = req.url()?;
    let path = url.path();

    if req.method() == Method::Get && path == "/health" {
        let body = serde_json::json!({
            "ok": true,
            "service": "gatherly",
        });
        let resp = Response::from_json(&body)?;
        return json_with_cors(&req, resp);
    }

    // Sign-up handshake.
    if req.method() == Method::Post && path == "/api/auth/register" {
        return handlers::registration::handle_register(req, &env).await;
    }
    if req.method() == Method::Post && path == "/api/auth/register/confirm" {
        return handlers::registration::handle_register_confirm(req, &env).await;
    }
    if req.method() == Method::Post && path == "/api/auth/register/resend" {
        return handlers::registration::handle_register_resend(req, &env).await;
    }

    // Sessions.
    if req.method() == Method::Post && path == "/api/auth/login" {
        return handlers::session::handle_login(req, &env).await;
    }
    if req.method() == Method::Get && path == "/api/users/me" {
        return handlers::session::handle_me(req, &env).await;
    }

    if req.method() == Method::Post && path == "/v1/admin/migrations/up" {
        return handlers::migrations::handle_migrations_up(&req, &env).await;
    }

    not_found(&req)
}
