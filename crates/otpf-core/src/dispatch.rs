//! Fan a matched rule out to its recipients.

use std::sync::Arc;

use tokio::{runtime::Handle, task::JoinHandle};

use crate::{
    domain::{Channel, ForwardingRule},
    ports::TelegramPort,
    sms::SmsTransport,
    store::RuleStore,
    utils::mask_recipient,
};

pub const TELEGRAM_HEADER: &str = "🔔 *New OTP Received* \n\n";

/// Markdown text sent to Telegram for a forwarded body.
pub fn telegram_text(body: &str) -> String {
    format!("{TELEGRAM_HEADER}{body}")
}

/// What a single `dispatch` submitted.
///
/// `tasks` are the spawned sends. Nothing in the receive path awaits them; a
/// short-lived process may use [`DispatchReport::join`] to keep them alive.
#[derive(Debug)]
pub struct DispatchReport {
    pub rule_id: String,
    pub keywords: String,
    pub channel: Channel,
    pub recipients: usize,
    pub tasks: Vec<JoinHandle<()>>,
}

impl DispatchReport {
    pub fn log_line(&self) -> String {
        format!(
            "Forwarded {} to {} numbers.",
            self.keywords, self.recipients
        )
    }

    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "forward task did not complete");
            }
        }
    }
}

/// Routes a rule's recipients to the SMS or Telegram transport.
#[derive(Clone)]
pub struct Dispatcher {
    store: RuleStore,
    sms: SmsTransport,
    telegram: Option<Arc<dyn TelegramPort>>,
    runtime: Handle,
}

impl Dispatcher {
    /// `telegram` is `None` when no bot token is configured.
    pub fn new(
        store: RuleStore,
        sms: SmsTransport,
        telegram: Option<Arc<dyn TelegramPort>>,
        runtime: Handle,
    ) -> Self {
        Self {
            store,
            sms,
            telegram,
            runtime,
        }
    }

    /// Submit one send per split recipient, then log the attempt.
    ///
    /// Sends run as detached tasks; their outcome only reaches tracing. The
    /// activity log line counts every split entry, including empty ones, and is
    /// written before any send completes.
    pub fn dispatch(&self, rule: &ForwardingRule, body: &str) -> DispatchReport {
        let recipients = rule.recipients();
        let channel = rule.channel();
        let mut tasks = Vec::with_capacity(recipients.len());

        for recipient in &recipients {
            match channel {
                Channel::Sms => tasks.push(self.spawn_sms(recipient.clone(), body.to_string())),
                Channel::Telegram => match &self.telegram {
                    Some(port) => tasks.push(self.spawn_telegram(
                        port.clone(),
                        recipient.clone(),
                        body.to_string(),
                    )),
                    None => tracing::error!(
                        rule_id = %rule.id,
                        chat_id = %recipient,
                        "telegram forward skipped: no bot token configured"
                    ),
                },
            }
        }

        let report = DispatchReport {
            rule_id: rule.id.clone(),
            keywords: rule.keywords.clone(),
            channel,
            recipients: recipients.len(),
            tasks,
        };

        if let Err(e) = self.store.append_log(&report.log_line()) {
            tracing::warn!(error = %e, "failed to append activity log");
        }
        tracing::info!(
            rule_id = %report.rule_id,
            channel = channel.as_str(),
            recipients = report.recipients,
            "dispatched"
        );
        report
    }

    fn spawn_sms(&self, recipient: String, body: String) -> JoinHandle<()> {
        let sms = self.sms.clone();
        self.runtime.spawn(async move {
            match sms.forward(&recipient, &body).await {
                Ok(()) => tracing::debug!(
                    recipient = %mask_recipient(&recipient),
                    "sms forwarded"
                ),
                Err(e) => tracing::error!(
                    recipient = %mask_recipient(&recipient),
                    error = %e,
                    "failed to forward sms"
                ),
            }
        })
    }

    fn spawn_telegram(
        &self,
        port: Arc<dyn TelegramPort>,
        chat_id: String,
        body: String,
    ) -> JoinHandle<()> {
        self.runtime.spawn(async move {
            match port.send_message(&chat_id, &telegram_text(&body)).await {
                Ok(()) => tracing::debug!(chat_id = %chat_id, "telegram forwarded"),
                Err(e) => tracing::error!(chat_id = %chat_id, error = %e, "failed to forward to telegram"),
            }
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        errors::Error, ports::SmsGateway, settings::MemorySettingsStore, Result,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct FakeGateway {
        pub(crate) sent: Mutex<Vec<(String, Vec<String>)>>,
    }

    #[async_trait]
    impl SmsGateway for FakeGateway {
        async fn send_multipart(&self, recipient: &str, parts: &[String]) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((recipient.to_string(), parts.to_vec()));
            Ok(())
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeTelegram {
        pub(crate) sent: Mutex<Vec<(String, String)>>,
        pub(crate) fail: bool,
    }

    #[async_trait]
    impl TelegramPort for FakeTelegram {
        async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((chat_id.to_string(), text.to_string()));
            if self.fail {
                return Err(Error::Transport("telegram returned 400".to_string()));
            }
            Ok(())
        }
    }

    pub(crate) struct Harness {
        pub(crate) store: RuleStore,
        pub(crate) gateway: Arc<FakeGateway>,
        pub(crate) telegram: Arc<FakeTelegram>,
        pub(crate) dispatcher: Dispatcher,
    }

    pub(crate) fn harness_with(telegram: FakeTelegram, with_token: bool) -> Harness {
        let store = RuleStore::new(Arc::new(MemorySettingsStore::new()));
        let gateway = Arc::new(FakeGateway::default());
        let telegram = Arc::new(telegram);
        let port: Option<Arc<dyn TelegramPort>> = if with_token {
            Some(telegram.clone() as Arc<dyn TelegramPort>)
        } else {
            None
        };
        let dispatcher = Dispatcher::new(
            store.clone(),
            SmsTransport::new(gateway.clone()),
            port,
            Handle::current(),
        );
        Harness {
            store,
            gateway,
            telegram,
            dispatcher,
        }
    }

    pub(crate) fn harness() -> Harness {
        harness_with(FakeTelegram::default(), true)
    }

    pub(crate) fn log_messages(store: &RuleStore) -> Vec<String> {
        store
            .log_lines()
            .into_iter()
            .map(|l| l.split_once("] ").map(|(_, m)| m.to_string()).unwrap_or(l))
            .collect()
    }

    #[tokio::test]
    async fn sms_rule_fans_out_to_every_number() {
        let h = harness();
        let rule = ForwardingRule::new(
            "verification code",
            "+919812345678,+919898989898",
            Channel::Sms,
        );
        let body = "Hi, your JioHotstar verification code is 5521";

        let report = h.dispatcher.dispatch(&rule, body);
        assert_eq!(report.recipients, 2);
        report.join().await;

        let expected = vec!["Forwarded: Hi, your JioHotstar verification code is 5521".to_string()];
        assert_eq!(
            h.gateway.sent.lock().unwrap().clone(),
            vec![
                ("+919812345678".to_string(), expected.clone()),
                ("+919898989898".to_string(), expected),
            ]
        );
        assert_eq!(
            log_messages(&h.store),
            vec!["Forwarded verification code to 2 numbers."]
        );
    }

    #[tokio::test]
    async fn telegram_rule_posts_formatted_text() {
        let h = harness();
        let rule = ForwardingRule::new("otp", "12345, -100777", Channel::Telegram);
        h.dispatcher.dispatch(&rule, "OTP 9911").join().await;

        let sent = h.telegram.sent.lock().unwrap().clone();
        assert_eq!(
            sent,
            vec![
                ("12345".to_string(), "🔔 *New OTP Received* \n\nOTP 9911".to_string()),
                ("-100777".to_string(), "🔔 *New OTP Received* \n\nOTP 9911".to_string()),
            ]
        );
        assert!(h.gateway.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_target_still_counts_one_recipient() {
        let h = harness();
        let rule = ForwardingRule::new("otp", "", Channel::Sms);
        let report = h.dispatcher.dispatch(&rule, "otp 1");
        assert_eq!(report.tasks.len(), 1);
        report.join().await;

        // The transport rejects the empty recipient; the gateway never sees it.
        assert!(h.gateway.sent.lock().unwrap().is_empty());
        assert_eq!(log_messages(&h.store), vec!["Forwarded otp to 1 numbers."]);
    }

    #[tokio::test]
    async fn transport_failure_does_not_touch_the_log() {
        let h = harness_with(
            FakeTelegram {
                fail: true,
                ..Default::default()
            },
            true,
        );
        let rule = ForwardingRule::new("otp", "1", Channel::Telegram);
        h.dispatcher.dispatch(&rule, "otp").join().await;

        assert_eq!(h.telegram.sent.lock().unwrap().len(), 1);
        assert_eq!(log_messages(&h.store), vec!["Forwarded otp to 1 numbers."]);
    }

    #[tokio::test]
    async fn missing_bot_token_skips_sends_but_logs() {
        let h = harness_with(FakeTelegram::default(), false);
        let rule = ForwardingRule::new("otp", "1,2", Channel::Telegram);
        let report = h.dispatcher.dispatch(&rule, "otp");
        assert!(report.tasks.is_empty());
        assert_eq!(report.recipients, 2);
        assert_eq!(log_messages(&h.store), vec!["Forwarded otp to 2 numbers."]);
    }
}
