//! HTTP-based SMS gateways.
//!
//! Supports Twilio's REST Messages API and a generic JSON webhook relay
//! (anything that accepts `{"to","from","body"}` and answers 2xx).

use crate::gateway::{OutgoingSms, SmsError, SmsFuture, SmsGateway, SmsReceipt};
use serde::{Deserialize, Serialize};

/// Which wire format the gateway speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Twilio,
    Webhook,
}

impl ProviderKind {
    /// Parse the `PLUGWATCH_SMS_PROVIDER` value. Unknown names fall back to webhook.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "twilio" => Self::Twilio,
            _ => Self::Webhook,
        }
    }

    fn default_base_url(self) -> Option<&'static str> {
        match self {
            Self::Twilio => Some("https://api.twilio.com"),
            Self::Webhook => None,
        }
    }
}

// ── Twilio types ──

#[derive(Serialize)]
struct TwilioForm<'a> {
    #[serde(rename = "To")]
    to: &'a str,
    #[serde(rename = "From")]
    from: &'a str,
    #[serde(rename = "Body")]
    body: &'a str,
}

#[derive(Deserialize)]
struct TwilioMessage {
    sid: Option<String>,
}

// ── Webhook types ──

#[derive(Serialize)]
struct WebhookRequest<'a> {
    to: &'a str,
    from: &'a str,
    body: &'a str,
}

#[derive(Deserialize)]
struct WebhookResponse {
    id: Option<String>,
}

// ── Gateway ──

/// HTTP SMS gateway. Handles both Twilio and webhook relays.
pub struct HttpGateway {
    kind: ProviderKind,
    client: reqwest::Client,
    base_url: String,
    account: String,
    token: String,
    from: String,
}

impl HttpGateway {
    /// Build from provider kind + credentials + optional base URL override.
    /// Returns `None` for a webhook without a URL or Twilio without credentials.
    pub fn new(
        kind: ProviderKind,
        account: String,
        token: String,
        from: String,
        base_url: Option<String>,
    ) -> Option<Self> {
        if kind == ProviderKind::Twilio && (account.is_empty() || token.is_empty()) {
            return None;
        }
        let base = base_url.or_else(|| kind.default_base_url().map(str::to_owned))?;
        Some(Self {
            kind,
            client: reqwest::Client::new(),
            base_url: base.trim_end_matches('/').to_owned(),
            account,
            token,
            from,
        })
    }

    fn endpoint(&self) -> String {
        match self.kind {
            ProviderKind::Twilio => format!(
                "{}/2010-04-01/Accounts/{}/Messages.json",
                self.base_url, self.account
            ),
            ProviderKind::Webhook => self.base_url.clone(),
        }
    }

    fn account_endpoint(&self) -> String {
        format!("{}/2010-04-01/Accounts/{}.json", self.base_url, self.account)
    }

    async fn send_twilio(&self, sms: OutgoingSms) -> Result<SmsReceipt, SmsError> {
        let form = TwilioForm { to: &sms.to, from: &self.from, body: &sms.body };
        let resp = self
            .client
            .post(self.endpoint())
            .basic_auth(&self.account, Some(&self.token))
            .form(&form)
            .send()
            .await
            .map_err(transport_error)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(check_error(status, &sms.to, text));
        }

        let msg: TwilioMessage = resp
            .json()
            .await
            .map_err(|e| SmsError::RequestFailed(e.to_string()))?;
        Ok(SmsReceipt { provider_id: msg.sid })
    }

    async fn send_webhook(&self, sms: OutgoingSms) -> Result<SmsReceipt, SmsError> {
        let body = WebhookRequest { to: &sms.to, from: &self.from, body: &sms.body };
        let mut req = self.client.post(self.endpoint()).json(&body);
        if !self.token.is_empty() {
            req = req.bearer_auth(&self.token);
        }
        let resp = req.send().await.map_err(transport_error)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(check_error(status, &sms.to, text));
        }

        // Relays are free to answer with an empty body.
        let text = resp.text().await.unwrap_or_default();
        let provider_id = serde_json::from_str::<WebhookResponse>(&text)
            .ok()
            .and_then(|r| r.id);
        Ok(SmsReceipt { provider_id })
    }

    async fn probe_twilio(&self) -> Result<(), SmsError> {
        let resp = self
            .client
            .get(self.account_endpoint())
            .basic_auth(&self.account, Some(&self.token))
            .send()
            .await
            .map_err(transport_error)?;
        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            Err(check_error(status, "", text))
        }
    }
}

/// Map an HTTP failure status to an [`SmsError`].
/// Auth failures concern the whole facility; 4xx otherwise concerns the recipient.
fn check_error(status: reqwest::StatusCode, to: &str, body: String) -> SmsError {
    match status.as_u16() {
        401 | 403 => SmsError::Unavailable(format!("credentials rejected ({status})")),
        429 => SmsError::RateLimited,
        400..=499 => SmsError::Rejected { to: to.to_owned(), reason: format!("{status}: {body}") },
        _ => SmsError::RequestFailed(format!("{status}: {body}")),
    }
}

fn transport_error(e: reqwest::Error) -> SmsError {
    if e.is_connect() {
        SmsError::Unavailable(e.to_string())
    } else {
        SmsError::RequestFailed(e.to_string())
    }
}

impl SmsGateway for HttpGateway {
    fn name(&self) -> &str {
        match self.kind {
            ProviderKind::Twilio => "twilio",
            ProviderKind::Webhook => "webhook",
        }
    }

    fn send(&self, sms: OutgoingSms) -> SmsFuture<'_, SmsReceipt> {
        match self.kind {
            ProviderKind::Twilio => Box::pin(self.send_twilio(sms)),
            ProviderKind::Webhook => Box::pin(self.send_webhook(sms)),
        }
    }

    fn probe(&self) -> SmsFuture<'_, ()> {
        match self.kind {
            ProviderKind::Twilio => Box::pin(self.probe_twilio()),
            // Relays have no account endpoint; send-time errors surface instead.
            ProviderKind::Webhook => Box::pin(async { Ok(()) }),
        }
    }
}

/// Build an SMS gateway from environment variables.
/// Reads `PLUGWATCH_SMS_PROVIDER`, `PLUGWATCH_SMS_ACCOUNT`, `PLUGWATCH_SMS_TOKEN`,
/// `PLUGWATCH_SMS_FROM`, optionally `PLUGWATCH_SMS_URL`.
/// Returns `None` if the provider is not set, Twilio lacks an account or token,
/// or a webhook has no URL.
pub fn from_env() -> Option<HttpGateway> {
    let kind = ProviderKind::from_name(&std::env::var("PLUGWATCH_SMS_PROVIDER").ok()?);
    let account = std::env::var("PLUGWATCH_SMS_ACCOUNT").unwrap_or_default();
    let token = std::env::var("PLUGWATCH_SMS_TOKEN").unwrap_or_default();
    let from = std::env::var("PLUGWATCH_SMS_FROM").unwrap_or_default();
    let base_url = std::env::var("PLUGWATCH_SMS_URL").ok();
    HttpGateway::new(kind, account, token, from, base_url)
}
