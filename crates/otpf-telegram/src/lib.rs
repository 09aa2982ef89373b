//! Telegram adapter (Bot HTTP API over reqwest).
//!
//! Implements the `otpf-core` TelegramPort with form-encoded `sendMessage`
//! calls, plus chat-id discovery through `getUpdates`.

use std::{sync::OnceLock, time::Duration};

use async_trait::async_trait;
use regex::Regex;

use otpf_core::{errors::Error, ports::TelegramPort, Result};

pub const PARSE_MODE: &str = "Markdown";

#[derive(Clone, Debug)]
pub struct TelegramClient {
    token: String,
    api_base: String,
    http: reqwest::Client,
}

impl TelegramClient {
    pub fn new(
        token: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;
        Ok(Self {
            token: token.into(),
            api_base: api_base.into(),
            http,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        method_url(&self.api_base, &self.token, method)
    }

    fn request_error(&self, e: reqwest::Error) -> Error {
        Error::Transport(format!(
            "telegram request error: {}",
            redact(&e.to_string(), &self.token)
        ))
    }

    /// Chat id of the most recent update the bot has seen, if any.
    ///
    /// The user messages the bot first; this then reads it back from
    /// `getUpdates`.
    pub async fn discover_chat_id(&self) -> Result<Option<String>> {
        let resp = self
            .http
            .get(self.endpoint("getUpdates"))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Transport(format!("telegram body error: {e}")))?;
        if !status.is_success() {
            return Err(Error::Transport(format!(
                "telegram getUpdates failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let chat_id = extract_last_chat_id(&body);
        match &chat_id {
            Some(id) => tracing::info!(chat_id = %id, "found telegram chat id"),
            None => tracing::info!("no chat id in getUpdates response"),
        }
        Ok(chat_id)
    }
}

#[async_trait]
impl TelegramPort for TelegramClient {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.endpoint("sendMessage"))
            .form(&send_message_form(chat_id, text))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::Transport(format!(
                "telegram sendMessage failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        tracing::debug!(response = %body, "telegram sendMessage ok");
        Ok(())
    }
}

pub fn method_url(api_base: &str, token: &str, method: &str) -> String {
    format!("{}/bot{token}/{method}", api_base.trim_end_matches('/'))
}

pub fn send_message_form<'a>(chat_id: &'a str, text: &'a str) -> [(&'static str, &'a str); 3] {
    [("chat_id", chat_id), ("text", text), ("parse_mode", PARSE_MODE)]
}

/// Last `"chat":{"id":<n>` occurrence in a raw `getUpdates` body.
pub fn extract_last_chat_id(body: &str) -> Option<String> {
    static CHAT_ID_RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = CHAT_ID_RE
        .get_or_init(|| Regex::new(r#""chat":\{"id":(-?\d+)"#).ok())
        .as_ref()?;
    re.captures_iter(body)
        .last()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

// reqwest errors include the URL, which carries the bot token.
fn redact(s: &str, token: &str) -> String {
    if token.is_empty() {
        return s.to_string();
    }
    s.replace(token, "<token>")
}
