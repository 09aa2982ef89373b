use tracing_subscriber::{fmt, EnvFilter};

use crate::Result;

/// Initialize tracing for the forwarder.
///
/// The subscriber writes to stderr so command output on stdout stays clean.
/// Transport failures and swallowed decode errors are reported here and
/// nowhere else.
pub fn init(service_name: &str) -> Result<()> {
    // Default: info for our crates, warn for everything else.
    // Can be overridden with `RUST_LOG`.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,otpf_core=info,otpf_telegram=info,otpf_sms_cli=info,{service_name}=info"
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
