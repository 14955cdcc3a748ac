use parking_lot::Mutex;

use super::error::ServiceError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl OutboundEmail {
    pub fn verification_code(app_name: &str, to: &str, code: &str, ttl_secs: u64) -> Self {
        let minutes = ttl_secs.div_ceil(60);
        Self {
            to: to.to_string(),
            subject: format!("Your {app_name} verification code"),
            text: format!(
                "Your {app_name} verification code is {code}.\n\
                 It expires in {minutes} minutes. If you did not sign up, you can ignore this email."
            ),
            html: format!(
                "<p>Your {app_name} verification code is</p>\
                 <p style=\"font-size:24px;font-weight:bold;letter-spacing:4px\">{code}</p>\
                 <p>It expires in {minutes} minutes. If you did not sign up, you can ignore this email.</p>"
            ),
        }
    }
}

/// Outbound email. A failed delivery must come back as an error, never as `Ok`.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait Notifier {
    async fn send(&self, email: OutboundEmail) -> Result<(), ServiceError>;
}

/// Keeps every message instead of delivering it.
#[derive(Default)]
pub struct OutboxNotifier {
    sent: Mutex<Vec<OutboundEmail>>,
}

impl OutboxNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().clone()
    }

    pub fn last_to(&self, to: &str) -> Option<OutboundEmail> {
        self.sent.lock().iter().rev().find(|m| m.to == to).cloned()
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl Notifier for OutboxNotifier {
    async fn send(&self, email: OutboundEmail) -> Result<(), ServiceError> {
        self.sent.lock().push(email);
        Ok(())
    }
}
