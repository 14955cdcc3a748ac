pub mod admin_auth;
pub mod migrations;
pub mod registration;
pub mod session;
