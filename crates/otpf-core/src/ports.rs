use async_trait::async_trait;

use crate::Result;

/// Platform telephony seam: submits pre-segmented text as one multipart SMS.
/// Adapters that cannot submit parts separately may rejoin them.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send_multipart(&self, recipient: &str, parts: &[String]) -> Result<()>;
}

/// Telegram Bot API seam. `text` is already formatted as Markdown.
#[async_trait]
pub trait TelegramPort: Send + Sync {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()>;
}
