use clap::Parser;

use otpf_core::config::Config;

mod cli;
mod commands;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    otpf_core::logging::init("otpf")?;

    let cli = cli::Cli::parse();
    let mut cfg = Config::load()?;
    if let Some(path) = cli.settings {
        cfg.settings_path = Some(path);
    }

    commands::run(cli.command, cfg).await
}
