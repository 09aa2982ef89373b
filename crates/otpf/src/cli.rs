use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "otpf")]
#[command(version, about = "Forward matching SMS messages to phone numbers or Telegram chats")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (defaults to ~/.otpf/settings.json)
    #[arg(long, global = true, env = "OTPF_SETTINGS_PATH")]
    pub settings: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Forwarding rule management
    Rules {
        #[command(subcommand)]
        command: RuleCommands,
    },

    /// Show the recent activity log (newest first)
    Logs,

    /// Handle an inbound SMS as if the system had delivered it
    Receive(ReceiveArgs),

    /// Print the chat id of the latest message sent to the bot
    ChatId,

    /// First-run state
    Onboarding {
        #[command(subcommand)]
        command: OnboardingCommands,
    },
}

#[derive(Subcommand)]
pub enum RuleCommands {
    /// List rules in match order
    List {
        #[arg(long)]
        json: bool,
    },
    /// Add a rule
    Add(RuleArgs),
    /// Replace fields of an existing rule
    Update(UpdateArgs),
    /// Delete a rule by id
    Delete { id: String },
}

#[derive(Args)]
pub struct RuleArgs {
    /// Trigger text, matched case-insensitively anywhere in the message
    #[arg(long)]
    pub keywords: String,

    /// Comma-separated phone numbers, or chat ids with --telegram
    #[arg(long)]
    pub target: String,

    /// Forward to Telegram instead of SMS
    #[arg(long)]
    pub telegram: bool,

    /// Require every SMS target to be a +91 mobile number
    #[arg(long)]
    pub check_phone: bool,
}

#[derive(Args)]
pub struct UpdateArgs {
    pub id: String,

    #[arg(long)]
    pub keywords: Option<String>,

    #[arg(long)]
    pub target: Option<String>,

    /// Set the channel: true = Telegram, false = SMS
    #[arg(long)]
    pub telegram: Option<bool>,

    #[arg(long)]
    pub check_phone: bool,
}

#[derive(Args)]
pub struct ReceiveArgs {
    /// Hex-encoded PDU; repeat for multi-unit broadcasts
    #[arg(long = "pdu", conflicts_with = "body")]
    pub pdus: Vec<String>,

    /// PDU format tag
    #[arg(long, default_value = "3gpp")]
    pub format: String,

    /// Already-decoded sender
    #[arg(long, default_value = "unknown")]
    pub sender: String,

    /// Already-decoded message body
    #[arg(long, required_unless_present = "pdus")]
    pub body: Option<String>,

    /// Log outbound SMS instead of running the gateway command
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum OnboardingCommands {
    Status,
    Complete,
}
