//! Telegram update handlers.
//!
//! Each handler validates auth, calls into the `clipbot-core` store, renders
//! an HTML reply, and records an audit event. Handler failures are reported
//! to the chat, never propagated to the dispatcher.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use clipbot_core::domain::UserId;

use crate::router::{is_authorized, AppState};

mod commands;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let user_id = msg.from().map(|u| UserId(u.id.0 as i64));

    if !is_authorized(user_id, &state.cfg.telegram_allowed_users) {
        let _ = bot
            .send_message(msg.chat.id, "Unauthorized. Contact the bot owner for access.")
            .await;
        return Ok(());
    }

    if let Some(text) = msg.text() {
        if text.starts_with('/') {
            return commands::handle_command(msg, state).await;
        }
    }

    let _ = bot
        .send_message(msg.chat.id, "Send /help to see what I can store for you.")
        .await;

    Ok(())
}
