use chrono::{DateTime, Utc};

/// Escape text for Telegram HTML.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Fixed-length, char-boundary-safe content preview for listings.
pub fn preview(content: &str, max_chars: usize) -> String {
    let mut out: String = content.chars().take(max_chars).collect();
    if content.chars().count() > max_chars {
        out.push_str("...");
    }
    // Listings are one line per clip.
    out.replace('\n', " ")
}

/// Human form of the time left until `expires_at` ("2d 3h", "45m", "now").
pub fn format_time_remaining(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = expires_at.signed_duration_since(now);
    if diff.num_seconds() <= 0 {
        return "now".to_string();
    }

    let diff_sec = diff.num_seconds();
    let days = diff_sec / 86400;
    let hours = (diff_sec % 86400) / 3600;
    let mins = (diff_sec % 3600) / 60;

    if days > 0 {
        return format!("{days}d {hours}h");
    }
    if hours > 0 {
        return format!("{hours}h {mins}m");
    }
    format!("{}m", mins.max(1))
}
