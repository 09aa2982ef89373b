use chrono::{Local, NaiveTime};

// ============== Timestamp Helpers ==============

/// Local wall-clock time, used to stamp activity log lines.
pub fn local_time_now() -> NaiveTime {
    Local::now().time()
}

/// `[HH:mm] message`
pub fn format_log_line(at: NaiveTime, message: &str) -> String {
    format!("[{}] {message}", at.format("%H:%M"))
}

// ============== Text Helpers ==============

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

/// Mask all but the last four characters of a recipient for diagnostics.
pub fn mask_recipient(recipient: &str) -> String {
    let n = recipient.chars().count();
    if n <= 4 {
        return recipient.to_string();
    }
    let tail: String = recipient.chars().skip(n - 4).collect();
    format!("{}{tail}", "*".repeat(n - 4))
}
