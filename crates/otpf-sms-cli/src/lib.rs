//! SMS gateway adapters backed by an external command.
//!
//! On a phone the usual command is `termux-sms-send -n <number> <text>`; any
//! program taking the recipient and text as arguments works.

use std::{collections::VecDeque, path::PathBuf, process::Stdio, sync::Arc};

use async_trait::async_trait;

use otpf_core::{
    config::RECIPIENT_PLACEHOLDER, errors::Error, ports::SmsGateway, utils::mask_recipient,
    Result,
};

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::Command,
    sync::Mutex,
};

const STDERR_TAIL_MAX_BYTES: usize = 4 * 1024;
const STDERR_TAIL_MAX_LINES: usize = 50;

#[derive(Clone, Debug, Default)]
struct StderrTail {
    lines: VecDeque<String>,
    bytes: usize,
}

impl StderrTail {
    fn push_line(&mut self, line: String) {
        // +1 for the '\n' we join with later.
        self.bytes = self.bytes.saturating_add(line.len() + 1);
        self.lines.push_back(line);

        while self.lines.len() > STDERR_TAIL_MAX_LINES || self.bytes > STDERR_TAIL_MAX_BYTES {
            if let Some(front) = self.lines.pop_front() {
                self.bytes = self.bytes.saturating_sub(front.len() + 1);
            } else {
                break;
            }
        }
    }

    fn snapshot(&self) -> String {
        self.lines.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

/// Runs `program args... text` once per multipart message.
///
/// `{recipient}` in `args` is replaced with the recipient. The parts are
/// rejoined into the final argument, so the command must do its own splitting
/// (`termux-sms-send` does).
#[derive(Clone, Debug)]
pub struct CommandGateway {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandGateway {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn build_args(&self, recipient: &str, parts: &[String]) -> Vec<String> {
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace(RECIPIENT_PLACEHOLDER, recipient))
            .collect();
        args.push(parts.concat());
        args
    }
}

#[async_trait]
impl SmsGateway for CommandGateway {
    async fn send_multipart(&self, recipient: &str, parts: &[String]) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(self.build_args(recipient, parts))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::Transport(format!(
                    "failed to spawn {}: {e}",
                    self.program.display()
                ))
            })?;

        // Drain stderr in background to avoid blocking on a full pipe.
        let stderr_tail = Arc::new(Mutex::new(StderrTail::default()));
        let drain = child.stderr.take().map(|stderr| {
            let tail = stderr_tail.clone();
            tokio::spawn(async move {
                let mut r = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = r.next_line().await {
                    tail.lock().await.push_line(line);
                }
            })
        });

        let status = child.wait().await?;
        if let Some(handle) = drain {
            let _ = handle.await;
        }

        if !status.success() {
            let stderr = stderr_tail.lock().await.snapshot();
            let mut msg = format!("{} exited with status {status}", self.program.display());
            if !stderr.trim().is_empty() {
                msg.push_str("\nstderr (tail):\n");
                msg.push_str(&stderr);
            }
            return Err(Error::Transport(msg));
        }

        tracing::debug!(
            recipient = %mask_recipient(recipient),
            parts = parts.len(),
            "sms command completed"
        );
        Ok(())
    }
}

/// Logs instead of sending. Used for `--dry-run`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DryRunGateway;

#[async_trait]
impl SmsGateway for DryRunGateway {
    async fn send_multipart(&self, recipient: &str, parts: &[String]) -> Result<()> {
        for (idx, part) in parts.iter().enumerate() {
            tracing::info!(
                recipient = %recipient,
                part = idx + 1,
                of = parts.len(),
                text = %part,
                "dry-run sms"
            );
        }
        Ok(())
    }
}
