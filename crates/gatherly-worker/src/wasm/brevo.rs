use serde::Serialize;
use worker::{Env, Headers, Method, Request, RequestInit};

use crate::registration::{Notifier, OutboundEmail, ServiceError};
use crate::worker_wasm::env::env_string;

const BREVO_SEND_URL: &str = "https://api.brevo.com/v3/smtp/email";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoEmailAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoSendEmailBody {
    sender: BrevoEmailAddress,
    to: Vec<BrevoEmailAddress>,
    subject: String,
    html_content: String,
    text_content: String,
}

fn require_env(env: &Env, key: &str) -> worker::Result<String> {
    env_string(env, key).ok_or_else(|| worker::Error::RustError(format!("{key} is required")))
}

fn is_success_status(status: u16) -> bool {
    (200..=299).contains(&status)
}

/// Transactional email through Brevo's SMTP API.
pub struct BrevoNotifier {
    api_key: String,
    sender_email: String,
    sender_name: Option<String>,
}

impl BrevoNotifier {
    pub fn from_env(env: &Env) -> worker::Result<Self> {
        Ok(Self {
            api_key: require_env(env, "BREVO_API_KEY")?,
            sender_email: require_env(env, "BREVO_SENDER_EMAIL")?,
            sender_name: env_string(env, "BREVO_SENDER_NAME"),
        })
    }

    async fn deliver(&self, email: OutboundEmail) -> worker::Result<()> {
        let body = BrevoSendEmailBody {
            sender: BrevoEmailAddress {
                email: self.sender_email.clone(),
                name: self.sender_name.clone(),
            },
            to: vec![BrevoEmailAddress {
                email: email.to,
                name: None,
            }],
            subject: email.subject,
            html_content: email.html,
            text_content: email.text,
        };

        let json = serde_json::to_string(&body)
            .map_err(|e| worker::Error::RustError(format!("Failed to serialize Brevo payload: {e}")))?;

        let headers = Headers::new();
        headers.set("api-key", &self.api_key)?;
        headers.set("Content-Type", "application/json")?;
        headers.set("Accept", "application/json")?;
        headers.set("User-Agent", "Gatherly/0.1 (Cloudflare Worker)")?;

        let mut init = RequestInit::new();
        init.with_method(Method::Post);
        init.with_headers(headers);
        init.with_body(Some(json.into()));

        let req = Request::new_with_init(BREVO_SEND_URL, &init)?;

        let mut resp = worker::Fetch::Request(req).send().await?;
        let status = resp.status_code();
        if is_success_status(status) {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(worker::Error::RustError(format!(
            "Brevo send failed (status={status}): {body}"
        )))
    }
}

#[async_trait::async_trait(?Send)]
impl Notifier for BrevoNotifier {
    async fn send(&self, email: OutboundEmail) -> Result<(), ServiceError> {
        self.deliver(email).await.map_err(ServiceError::unavailable)
    }
}
