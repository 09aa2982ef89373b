//! Rule and activity-log persistence on top of a [`SettingsStore`].

use std::sync::Arc;

use chrono::NaiveTime;

use crate::{
    domain::ForwardingRule,
    settings::{Preferences, SettingsStore},
    utils::{format_log_line, local_time_now},
    Result,
};

pub const RULES_KEY: &str = "forwarding_rules";
pub const LOGS_KEY: &str = "forwarding_logs";
pub const ONBOARDING_KEY: &str = "onboarding_completed";

pub const LOG_CAPACITY: usize = 15;
pub const EMPTY_LOG_PLACEHOLDER: &str = "No logs yet.";

/// Sole owner of the forwarding rules, the activity log and the onboarding
/// flag.
///
/// Every mutation is a full read-modify-write of the affected key. Concurrent
/// writers are last-write-wins.
#[derive(Clone)]
pub struct RuleStore {
    settings: Arc<dyn SettingsStore>,
}

impl RuleStore {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    // ============== Rules ==============

    /// Current rules in storage order.
    ///
    /// Blocks until the settings read completes. Absent or corrupt data yields
    /// an empty list; the cause is only logged.
    pub fn list_rules(&self) -> Vec<ForwardingRule> {
        let prefs = match self.settings.snapshot() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read settings; treating rule list as empty");
                return Vec::new();
            }
        };
        match decode_rules(&prefs) {
            Ok(rules) => rules,
            Err(e) => {
                tracing::warn!(error = %e, "stored rules are corrupt; treating rule list as empty");
                Vec::new()
            }
        }
    }

    pub fn add_rule(&self, rule: ForwardingRule) -> Result<()> {
        self.edit_rules(|rules| rules.push(rule.clone()))
    }

    /// Replace the rule with the same id. Unknown ids leave the list unchanged.
    pub fn update_rule(&self, rule: ForwardingRule) -> Result<()> {
        self.edit_rules(|rules| {
            for existing in rules.iter_mut().filter(|r| r.id == rule.id) {
                *existing = rule.clone();
            }
        })
    }

    /// Remove the rule with this id. Unknown ids are a no-op.
    pub fn delete_rule(&self, id: &str) -> Result<()> {
        self.edit_rules(|rules| rules.retain(|r| r.id != id))
    }

    fn edit_rules(&self, mut change: impl FnMut(&mut Vec<ForwardingRule>)) -> Result<()> {
        self.settings.edit(&mut |prefs| {
            let mut rules = decode_rules(prefs)?;
            change(&mut rules);
            prefs.set_string(RULES_KEY, serde_json::to_string(&rules)?);
            Ok(())
        })
    }

    // ============== Activity Log ==============

    /// Prepend `[HH:mm] message` (local time) and keep the newest lines only.
    pub fn append_log(&self, message: &str) -> Result<()> {
        self.append_log_at(local_time_now(), message)
    }

    pub fn append_log_at(&self, at: NaiveTime, message: &str) -> Result<()> {
        // Embedded newlines would break the line-count bound.
        let line = format_log_line(at, &message.replace(['\r', '\n'], " "));
        self.settings.edit(&mut |prefs| {
            let current = prefs.get_string(LOGS_KEY).unwrap_or_default();
            let lines: Vec<&str> = std::iter::once(line.as_str())
                .chain(current.split('\n').filter(|l| !l.is_empty()))
                .take(LOG_CAPACITY)
                .collect();
            let joined = lines.join("\n");
            prefs.set_string(LOGS_KEY, joined);
            Ok(())
        })
    }

    /// Log blob as shown to the user, or a placeholder when nothing was logged.
    pub fn logs(&self) -> String {
        let lines = self.log_lines();
        if lines.is_empty() {
            return EMPTY_LOG_PLACEHOLDER.to_string();
        }
        lines.join("\n")
    }

    /// Newest first.
    pub fn log_lines(&self) -> Vec<String> {
        let prefs = match self.settings.snapshot() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read activity log");
                return Vec::new();
            }
        };
        prefs
            .get_string(LOGS_KEY)
            .unwrap_or_default()
            .split('\n')
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }

    // ============== Onboarding ==============

    pub fn onboarding_completed(&self) -> bool {
        self.settings
            .snapshot()
            .ok()
            .and_then(|p| p.get_bool(ONBOARDING_KEY))
            .unwrap_or(false)
    }

    pub fn set_onboarding_completed(&self) -> Result<()> {
        self.settings.edit(&mut |prefs| {
            prefs.set_bool(ONBOARDING_KEY, true);
            Ok(())
        })
    }
}

fn decode_rules(prefs: &Preferences) -> Result<Vec<ForwardingRule>> {
    let Some(json) = prefs.get_string(RULES_KEY) else {
        return Ok(Vec::new());
    };
    Ok(serde_json::from_str(json)?)
}
