use serde::{Deserialize, Serialize};

/// Outbound channel a rule forwards to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Sms,
    Telegram,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Sms => "sms",
            Channel::Telegram => "telegram",
        }
    }
}

/// A keyword-to-recipients forwarding mapping.
///
/// Serialized field names match the persisted settings layout
/// (`id`, `keywords`, `target`, `isTelegram`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingRule {
    #[serde(default = "new_rule_id")]
    pub id: String,
    pub keywords: String,
    /// Comma-separated phone numbers or Telegram chat ids.
    pub target: String,
    #[serde(rename = "isTelegram", default)]
    pub is_telegram: bool,
}

impl ForwardingRule {
    pub fn new(keywords: impl Into<String>, target: impl Into<String>, channel: Channel) -> Self {
        Self {
            id: new_rule_id(),
            keywords: keywords.into(),
            target: target.into(),
            is_telegram: channel == Channel::Telegram,
        }
    }

    pub fn channel(&self) -> Channel {
        if self.is_telegram {
            Channel::Telegram
        } else {
            Channel::Sms
        }
    }

    /// Split `target` on commas and trim each entry.
    ///
    /// Empty entries are kept: an empty target yields one empty recipient.
    pub fn recipients(&self) -> Vec<String> {
        self.target.split(',').map(|s| s.trim().to_string()).collect()
    }
}

fn new_rule_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A decoded inbound SMS.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmsMessage {
    pub sender: String,
    pub body: String,
}

/// Inbound system broadcast carrying raw SMS protocol data units.
#[derive(Clone, Debug, Default)]
pub struct Broadcast {
    pub action: String,
    pub pdus: Vec<Vec<u8>>,
    /// `3gpp` or `3gpp2`; `None` means the 3GPP default.
    pub format: Option<String>,
}
