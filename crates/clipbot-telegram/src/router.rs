use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use clipbot_core::{
    audit::AuditLogger, config::Config, domain::UserId, messaging::port::MessagingPort,
    store::ClipStore,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub store: ClipStore,
    pub messenger: Arc<dyn MessagingPort>,
    pub audit: Arc<AuditLogger>,
}

/// Allowlist gate. An empty allowlist means the bot is open; clip privacy
/// is still enforced per-record by the store.
pub fn is_authorized(user_id: Option<UserId>, allowed: &[i64]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    match user_id {
        Some(UserId(id)) => allowed.contains(&id),
        None => false,
    }
}

pub async fn run_polling(
    cfg: Arc<Config>,
    store: ClipStore,
    audit: Arc<AuditLogger>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    // Basic startup info.
    if let Ok(me) = bot.get_me().await {
        println!("clipbot started: @{}", me.username());
    }
    if cfg.telegram_allowed_users.is_empty() {
        println!("Allowlist: open to all users");
    } else {
        println!("Allowlist: {} users", cfg.telegram_allowed_users.len());
    }

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        store,
        messenger,
        audit,
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
