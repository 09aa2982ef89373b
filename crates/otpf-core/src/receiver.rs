//! Inbound SMS entry point.

use std::sync::Arc;

use crate::{
    classifier::match_rules,
    dispatch::{DispatchReport, Dispatcher},
    domain::{Broadcast, SmsMessage},
    pdu::decode_pdu,
    store::RuleStore,
    utils::truncate_text,
};

pub const SMS_RECEIVED_ACTION: &str = "android.provider.Telephony.SMS_RECEIVED";

/// Classify-and-dispatch handler for received messages.
///
/// Runs synchronously on the caller's thread. The rule read blocks until
/// storage returns. Transport sends are spawned and never awaited here.
#[derive(Clone)]
pub struct SmsReceiver {
    store: RuleStore,
    dispatcher: Arc<Dispatcher>,
}

impl SmsReceiver {
    pub fn new(store: RuleStore, dispatcher: Arc<Dispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Handle a system broadcast. Other actions are ignored.
    ///
    /// Each PDU is handled on its own, in delivery order. A PDU that fails to
    /// decode is skipped.
    pub fn on_receive(&self, broadcast: &Broadcast) -> Vec<DispatchReport> {
        if broadcast.action != SMS_RECEIVED_ACTION {
            tracing::debug!(action = %broadcast.action, "ignoring broadcast");
            return Vec::new();
        }

        let mut reports = Vec::new();
        for (idx, pdu) in broadcast.pdus.iter().enumerate() {
            match decode_pdu(pdu, broadcast.format.as_deref()) {
                Ok(msg) => reports.extend(self.on_message(&msg)),
                Err(e) => tracing::warn!(index = idx, error = %e, "skipping undecodable pdu"),
            }
        }
        reports
    }

    /// Match one decoded message against the current rules and dispatch every hit.
    pub fn on_message(&self, msg: &SmsMessage) -> Vec<DispatchReport> {
        let rules = self.store.list_rules();
        let hits = match_rules(&rules, &msg.body);
        tracing::info!(
            sender = %msg.sender,
            preview = %truncate_text(msg.body.trim(), 24),
            rules = rules.len(),
            matched = hits.len(),
            "sms received"
        );

        hits.into_iter()
            .map(|rule| self.dispatcher.dispatch(rule, &msg.body))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dispatch::tests::{harness, log_messages},
        domain::{Channel, ForwardingRule},
        pdu::decode_hex,
    };

    fn receiver(h: &crate::dispatch::tests::Harness) -> SmsReceiver {
        SmsReceiver::new(h.store.clone(), Arc::new(h.dispatcher.clone()))
    }

    async fn join_all(reports: Vec<DispatchReport>) {
        for r in reports {
            r.join().await;
        }
    }

    #[tokio::test]
    async fn overlapping_rules_fire_independently() {
        let h = harness();
        h.store
            .add_rule(ForwardingRule::new("OTP", "+911", Channel::Sms))
            .unwrap();
        h.store
            .add_rule(ForwardingRule::new("code", "42", Channel::Telegram))
            .unwrap();

        let rx = receiver(&h);
        let reports = rx.on_message(&SmsMessage {
            sender: "BANK".to_string(),
            body: "Your OTP code is 1234".to_string(),
        });
        assert_eq!(reports.len(), 2);
        join_all(reports).await;

        assert_eq!(h.gateway.sent.lock().unwrap().len(), 1);
        assert_eq!(h.telegram.sent.lock().unwrap().len(), 1);
        assert_eq!(
            log_messages(&h.store),
            vec![
                "Forwarded code to 1 numbers.",
                "Forwarded OTP to 1 numbers."
            ]
        );
    }

    #[tokio::test]
    async fn unmatched_message_does_nothing() {
        let h = harness();
        h.store
            .add_rule(ForwardingRule::new("otp", "+911", Channel::Sms))
            .unwrap();
        let reports = receiver(&h).on_message(&SmsMessage {
            sender: "x".to_string(),
            body: "hello there".to_string(),
        });
        assert!(reports.is_empty());
        assert!(h.store.log_lines().is_empty());
    }

    #[tokio::test]
    async fn broadcast_decodes_each_pdu_and_skips_bad_ones() {
        let h = harness();
        h.store
            .add_rule(ForwardingRule::new("hello", "+911", Channel::Sms))
            .unwrap();

        let good = decode_hex("00 04 04 D0 4121 00 00 52106121430000 05 E8329BFD06").unwrap();
        let broadcast = Broadcast {
            action: SMS_RECEIVED_ACTION.to_string(),
            pdus: vec![vec![0x00, 0x04], good],
            format: Some("3gpp".to_string()),
        };
        let reports = receiver(&h).on_receive(&broadcast);
        assert_eq!(reports.len(), 1);
        join_all(reports).await;

        assert_eq!(
            h.gateway.sent.lock().unwrap().clone(),
            vec![("+911".to_string(), vec!["Forwarded: hello".to_string()])]
        );
    }

    #[tokio::test]
    async fn other_actions_are_ignored() {
        let h = harness();
        h.store
            .add_rule(ForwardingRule::new("hello", "+911", Channel::Sms))
            .unwrap();
        let broadcast = Broadcast {
            action: "android.intent.action.BOOT_COMPLETED".to_string(),
            pdus: vec![decode_hex("00 04 04 D0 4121 00 00 52106121430000 05 E8329BFD06").unwrap()],
            format: None,
        };
        assert!(receiver(&h).on_receive(&broadcast).is_empty());
    }
}
