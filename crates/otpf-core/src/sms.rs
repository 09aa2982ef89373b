//! Outbound SMS: forward marker, segmentation, multipart submission.

use std::sync::Arc;

use crate::{errors::Error, gsm7, ports::SmsGateway, Result};

pub const FORWARD_PREFIX: &str = "Forwarded: ";

const GSM7_SINGLE: usize = 160;
const GSM7_MULTI: usize = 153;
const UCS2_SINGLE: usize = 70;
const UCS2_MULTI: usize = 67;

/// Encoding an outbound text will be sent with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SmsEncoding {
    Gsm7,
    Ucs2,
}

pub fn encoding_for(text: &str) -> SmsEncoding {
    if text.chars().all(|c| gsm7::septet_cost(c).is_some()) {
        SmsEncoding::Gsm7
    } else {
        SmsEncoding::Ucs2
    }
}

/// Split `text` into SMS-sized parts.
///
/// GSM 7-bit text fits 160 septets in one part, 153 per part once
/// concatenated; extension characters cost two septets and are never split.
/// Anything else goes out as UCS-2 with 70/67 UTF-16 units, keeping surrogate
/// pairs together. An empty text is one empty part.
pub fn divide_message(text: &str) -> Vec<String> {
    let (cost, single, multi): (fn(char) -> usize, usize, usize) = match encoding_for(text) {
        SmsEncoding::Gsm7 => (gsm7_cost as fn(char) -> usize, GSM7_SINGLE, GSM7_MULTI),
        SmsEncoding::Ucs2 => (ucs2_cost as fn(char) -> usize, UCS2_SINGLE, UCS2_MULTI),
    };

    let total: usize = text.chars().map(cost).sum();
    if total <= single {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut used = 0usize;
    for c in text.chars() {
        let n = cost(c);
        if used + n > multi {
            parts.push(std::mem::take(&mut current));
            used = 0;
        }
        current.push(c);
        used += n;
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn gsm7_cost(c: char) -> usize {
    gsm7::septet_cost(c).unwrap_or(1)
}

fn ucs2_cost(c: char) -> usize {
    c.len_utf16()
}

/// SMS transport over a platform gateway.
#[derive(Clone)]
pub struct SmsTransport {
    gateway: Arc<dyn SmsGateway>,
}

impl SmsTransport {
    pub fn new(gateway: Arc<dyn SmsGateway>) -> Self {
        Self { gateway }
    }

    /// Forward `body` to one recipient as a single multipart message.
    pub async fn forward(&self, recipient: &str, body: &str) -> Result<()> {
        if recipient.is_empty() {
            return Err(Error::Transport("empty sms recipient".to_string()));
        }
        let parts = divide_message(&format!("{FORWARD_PREFIX}{body}"));
        self.gateway.send_multipart(recipient, &parts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGateway {
        sent: Mutex<Vec<(String, Vec<String>)>>,
    }

    #[async_trait]
    impl SmsGateway for RecordingGateway {
        async fn send_multipart(&self, recipient: &str, parts: &[String]) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((recipient.to_string(), parts.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn short_gsm_text_is_one_part() {
        let text = "a".repeat(160);
        assert_eq!(divide_message(&text), vec![text]);
        assert_eq!(divide_message(""), vec![String::new()]);
    }

    #[test]
    fn long_gsm_text_splits_at_153() {
        let text = "a".repeat(161);
        let parts = divide_message(&text);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), 153);
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts.concat(), text);
    }

    #[test]
    fn extension_chars_count_double_and_are_not_split() {
        // 80 euro signs = 160 septets, still a single part.
        let text = "€".repeat(80);
        assert_eq!(divide_message(&text).len(), 1);

        // 152 + 2 septets would exceed 153, so the euro starts the next part.
        let text = format!("{}€{}", "a".repeat(152), "b".repeat(10));
        let parts = divide_message(&text);
        assert_eq!(parts[0], "a".repeat(152));
        assert!(parts[1].starts_with('€'));
    }

    #[test]
    fn non_gsm_text_uses_ucs2_limits() {
        let text = "न".repeat(70);
        assert_eq!(encoding_for(&text), SmsEncoding::Ucs2);
        assert_eq!(divide_message(&text).len(), 1);

        let text = "न".repeat(71);
        let parts = divide_message(&text);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].chars().count(), 67);
    }

    #[test]
    fn surrogate_pairs_stay_together() {
        // 33 emoji = 66 units; the 34th would need units 67..68.
        let text = format!("{}{}", "😀".repeat(34), "x".repeat(10));
        let parts = divide_message(&text);
        assert_eq!(parts[0], "😀".repeat(33));
        assert!(parts[1].starts_with('😀'));
    }

    #[tokio::test]
    async fn forward_prefixes_body() {
        let gw = Arc::new(RecordingGateway::default());
        let sms = SmsTransport::new(gw.clone());
        sms.forward("+919812345678", "code 1234").await.unwrap();

        let sent = gw.sent.lock().unwrap().clone();
        assert_eq!(
            sent,
            vec![(
                "+919812345678".to_string(),
                vec!["Forwarded: code 1234".to_string()]
            )]
        );
    }

    #[tokio::test]
    async fn empty_recipient_is_a_transport_error() {
        let gw = Arc::new(RecordingGateway::default());
        let sms = SmsTransport::new(gw.clone());
        let err = sms.forward("", "x").await;
        assert!(matches!(err, Err(Error::Transport(_))));
        assert!(gw.sent.lock().unwrap().is_empty());
    }
}
