use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration for the clip bot.
///
/// Everything is env-driven with a `.env` convenience loader; only the bot
/// token is required.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    /// Optional allowlist. Empty means the bot is open to any user.
    pub telegram_allowed_users: Vec<i64>,

    // Store behavior
    pub sweep_interval: Duration,
    pub list_page_size: usize,
    pub preview_length: usize,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        // Allowlist is optional here: clips carry their own visibility flag.
        let telegram_allowed_users = parse_csv_i64(env_str("TELEGRAM_ALLOWED_USERS"));

        // Sweep runs hourly unless overridden.
        let sweep_interval = Duration::from_secs(env_u64("SWEEP_INTERVAL_SECS").unwrap_or(3600));

        let list_page_size = env_usize("LIST_PAGE_SIZE").unwrap_or(10).max(1);
        let preview_length = env_usize("PREVIEW_LENGTH").unwrap_or(80).max(10);

        let audit_log_path =
            PathBuf::from(env_str("AUDIT_LOG_PATH").unwrap_or("/tmp/clipbot-audit.log".to_string()));
        let audit_log_json = env_bool("AUDIT_LOG_JSON").unwrap_or(false);

        Ok(Self {
            telegram_bot_token,
            telegram_allowed_users,
            sweep_interval,
            list_page_size,
            preview_length,
            audit_log_path,
            audit_log_json,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

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
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_users_skips_garbage() {
        let users = parse_csv_i64(Some("123, abc, 456,".to_string()));
        assert_eq!(users, vec![123, 456]);
    }

    #[test]
    fn env_bool_accepts_common_truthy_forms() {
        env::set_var("CLIPBOT_TEST_BOOL", "Yes");
        assert_eq!(env_bool("CLIPBOT_TEST_BOOL"), Some(true));
        env::set_var("CLIPBOT_TEST_BOOL", "0");
        assert_eq!(env_bool("CLIPBOT_TEST_BOOL"), Some(false));
        env::remove_var("CLIPBOT_TEST_BOOL");
    }
}
