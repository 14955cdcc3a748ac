pub mod crypto;
pub mod directory_db;
pub mod jwt;
pub mod registration;
pub mod util;

#[cfg(target_arch = "wasm32")]
mod worker_wasm;

#[cfg(target_arch = "wasm32")]
pub use worker_wasm::*;

/// The HTTP surface is built for Cloudflare Workers (wasm32-unknown-unknown).
///
/// The registration core compiles everywhere so it can be tested natively.
#[cfg(not(target_arch = "wasm32"))]
pub fn build_target_hint() -> &'static str {
    "gatherly-worker serves HTTP on wasm32-unknown-unknown (Cloudflare Workers)"
}
