use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";
pub const DEFAULT_SMS_COMMAND: &str = "termux-sms-send";
pub const RECIPIENT_PLACEHOLDER: &str = "{recipient}";

/// Typed configuration for the forwarder.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub bot_token: Option<String>,
    pub telegram_api_base: String,
    pub http_timeout: Duration,

    // Storage; `None` when neither OTPF_SETTINGS_PATH nor HOME is set.
    pub settings_path: Option<PathBuf>,

    // SMS gateway command
    pub sms_command: PathBuf,
    pub sms_args: Vec<String>,
}

impl Config {
    /// Load from the process environment, after applying `.env` if present.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let bot_token = get("OTPF_BOT_TOKEN").or_else(|| get("TELEGRAM_BOT_TOKEN"));
        let telegram_api_base = get("OTPF_TELEGRAM_API_BASE")
            .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        let http_timeout = Duration::from_millis(
            parse_num(get("OTPF_HTTP_TIMEOUT_MS"), "OTPF_HTTP_TIMEOUT_MS")?.unwrap_or(10_000),
        );

        let settings_path = get("OTPF_SETTINGS_PATH").map(PathBuf::from).or_else(|| {
            get("HOME").map(|home| PathBuf::from(home).join(".otpf").join("settings.json"))
        });

        let sms_command =
            PathBuf::from(get("OTPF_SMS_COMMAND").unwrap_or_else(|| DEFAULT_SMS_COMMAND.to_string()));
        let sms_args = get("OTPF_SMS_ARGS")
            .map(|v| parse_csv(&v))
            .unwrap_or_else(|| vec!["-n".to_string(), RECIPIENT_PLACEHOLDER.to_string()]);

        Ok(Self {
            bot_token,
            telegram_api_base,
            http_timeout,
            settings_path,
            sms_command,
            sms_args,
        })
    }

    pub fn require_settings_path(&self) -> Result<&Path> {
        self.settings_path.as_deref().ok_or_else(|| {
            Error::Config("HOME is not set and OTPF_SETTINGS_PATH is missing".to_string())
        })
    }

    pub fn require_bot_token(&self) -> Result<&str> {
        self.bot_token.as_deref().ok_or_else(|| {
            Error::Config("OTPF_BOT_TOKEN (or TELEGRAM_BOT_TOKEN) is required".to_string())
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn parse_num(v: Option<String>, key: &str) -> Result<Option<u64>> {
    v.map(|s| {
        s.trim()
            .parse::<u64>()
            .map_err(|e| Error::Config(format!("{key}: {e}")))
    })
    .transpose()
}

fn parse_csv(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
