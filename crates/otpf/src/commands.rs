use std::sync::Arc;

use anyhow::{bail, Context};
use regex::Regex;
use tokio::runtime::Handle;

use otpf_core::{
    config::Config,
    dispatch::Dispatcher,
    domain::{Broadcast, Channel, ForwardingRule, SmsMessage},
    pdu::decode_hex,
    ports::{SmsGateway, TelegramPort},
    receiver::{SmsReceiver, SMS_RECEIVED_ACTION},
    settings::FileSettingsStore,
    sms::SmsTransport,
    store::RuleStore,
};
use otpf_sms_cli::{CommandGateway, DryRunGateway};
use otpf_telegram::TelegramClient;

use crate::cli::{Commands, OnboardingCommands, ReceiveArgs, RuleArgs, RuleCommands, UpdateArgs};

pub async fn run(command: Commands, cfg: Config) -> anyhow::Result<()> {
    let store = open_store(&cfg)?;
    match command {
        Commands::Rules { command } => run_rules(command, &store),
        Commands::Logs => {
            println!("{}", store.logs());
            Ok(())
        }
        Commands::Receive(args) => receive(args, &cfg, store).await,
        Commands::ChatId => chat_id(&cfg).await,
        Commands::Onboarding { command } => match command {
            OnboardingCommands::Status => {
                println!("{}", store.onboarding_completed());
                Ok(())
            }
            OnboardingCommands::Complete => Ok(store.set_onboarding_completed()?),
        },
    }
}

fn open_store(cfg: &Config) -> anyhow::Result<RuleStore> {
    let path = cfg.require_settings_path()?;
    let settings = FileSettingsStore::open(path)
        .with_context(|| format!("opening settings at {}", path.display()))?;
    tracing::debug!(path = %path.display(), "settings opened");
    Ok(RuleStore::new(Arc::new(settings)))
}

fn run_rules(command: RuleCommands, store: &RuleStore) -> anyhow::Result<()> {
    match command {
        RuleCommands::List { json } => {
            let rules = store.list_rules();
            if json {
                println!("{}", serde_json::to_string_pretty(&rules)?);
                return Ok(());
            }
            if rules.is_empty() {
                println!("No rules.");
            }
            for r in rules {
                println!(
                    "{}  [{}]  {:?} -> {}",
                    r.id,
                    r.channel().as_str(),
                    r.keywords,
                    r.target
                );
            }
            Ok(())
        }
        RuleCommands::Add(RuleArgs {
            keywords,
            target,
            telegram,
            check_phone,
        }) => {
            if keywords.trim().is_empty() {
                bail!("keywords must not be empty");
            }
            let channel = if telegram {
                Channel::Telegram
            } else {
                Channel::Sms
            };
            let rule = ForwardingRule::new(keywords, target, channel);
            if check_phone {
                check_phone_targets(&rule)?;
            }
            store.add_rule(rule.clone())?;
            println!("{}", rule.id);
            Ok(())
        }
        RuleCommands::Update(UpdateArgs {
            id,
            keywords,
            target,
            telegram,
            check_phone,
        }) => {
            let Some(mut rule) = store.list_rules().into_iter().find(|r| r.id == id) else {
                eprintln!("No rule with id {id}");
                return Ok(());
            };
            if let Some(k) = keywords {
                if k.trim().is_empty() {
                    bail!("keywords must not be empty");
                }
                rule.keywords = k;
            }
            if let Some(t) = target {
                rule.target = t;
            }
            if let Some(tg) = telegram {
                rule.is_telegram = tg;
            }
            if check_phone {
                check_phone_targets(&rule)?;
            }
            store.update_rule(rule)?;
            Ok(())
        }
        RuleCommands::Delete { id } => Ok(store.delete_rule(&id)?),
    }
}

/// Indian mobile numbers only (`+91` followed by ten digits starting 6-9).
fn check_phone_targets(rule: &ForwardingRule) -> anyhow::Result<()> {
    if rule.channel() != Channel::Sms {
        return Ok(());
    }
    let re = Regex::new(r"^\+91[6-9]\d{9}$")?;
    for number in rule.recipients() {
        if !re.is_match(&number) {
            bail!("invalid phone number {number:?}: expected +91 followed by 10 digits");
        }
    }
    Ok(())
}

async fn receive(args: ReceiveArgs, cfg: &Config, store: RuleStore) -> anyhow::Result<()> {
    let gateway: Arc<dyn SmsGateway> = if args.dry_run {
        Arc::new(DryRunGateway)
    } else {
        Arc::new(CommandGateway::new(
            cfg.sms_command.clone(),
            cfg.sms_args.clone(),
        ))
    };
    let telegram: Option<Arc<dyn TelegramPort>> = match &cfg.bot_token {
        Some(token) => Some(Arc::new(TelegramClient::new(
            token.clone(),
            cfg.telegram_api_base.clone(),
            cfg.http_timeout,
        )?) as Arc<dyn TelegramPort>),
        None => None,
    };
    let dispatcher = Dispatcher::new(
        store.clone(),
        SmsTransport::new(gateway),
        telegram,
        Handle::current(),
    );
    let receiver = SmsReceiver::new(store, Arc::new(dispatcher));

    // The handler blocks on storage, so run it off the async workers.
    let reports = if args.pdus.is_empty() {
        let msg = SmsMessage {
            sender: args.sender,
            body: args.body.unwrap_or_default(),
        };
        tokio::task::spawn_blocking(move || receiver.on_message(&msg)).await?
    } else {
        let pdus = args
            .pdus
            .iter()
            .map(|h| decode_hex(h))
            .collect::<Result<Vec<_>, _>>()?;
        let broadcast = Broadcast {
            action: SMS_RECEIVED_ACTION.to_string(),
            pdus,
            format: Some(args.format),
        };
        tokio::task::spawn_blocking(move || receiver.on_receive(&broadcast)).await?
    };

    if reports.is_empty() {
        println!("No matching rules.");
    }
    // Sends are detached; keep the process alive until they finish.
    for report in reports {
        println!("{}", report.log_line());
        report.join().await;
    }
    Ok(())
}

async fn chat_id(cfg: &Config) -> anyhow::Result<()> {
    let client = TelegramClient::new(
        cfg.require_bot_token()?,
        cfg.telegram_api_base.clone(),
        cfg.http_timeout,
    )?;
    match client.discover_chat_id().await? {
        Some(id) => println!("{id}"),
        None => bail!("no chat found; send a message to the bot first"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_check_accepts_indian_mobiles_only() {
        let ok = ForwardingRule::new("otp", "+919812345678, +916000000000", Channel::Sms);
        assert!(check_phone_targets(&ok).is_ok());

        for bad in ["+915812345678", "9812345678", "+91981234567", ""] {
            let rule = ForwardingRule::new("otp", bad, Channel::Sms);
            assert!(check_phone_targets(&rule).is_err(), "{bad}");
        }

        let tg = ForwardingRule::new("otp", "-100123", Channel::Telegram);
        assert!(check_phone_targets(&tg).is_ok());
    }
}
