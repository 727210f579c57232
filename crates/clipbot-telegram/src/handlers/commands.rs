use std::sync::Arc;

use chrono::Utc;
use teloxide::prelude::*;

use clipbot_core::{
    audit::AuditEvent,
    codegen::looks_like_code,
    domain::ChatId,
    errors::Error,
    expiry::TtlSpec,
    formatting::{escape_html, format_time_remaining},
    store::{ClipPage, SaveRequest},
};

use crate::router::AppState;

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

#[derive(Clone, Debug, Default, PartialEq)]
struct SaveArgs {
    ttl: Option<TtlSpec>,
    is_public: bool,
    tags: Vec<String>,
    content: String,
}

/// Split `/save` arguments into leading option tokens and content.
///
/// Options are: a TTL token (`10m`/`2h`/`3d`), the word `public`, and
/// `#tag`s. The first token that is none of these starts the content, which
/// keeps its original whitespace. A token that fails to parse as a TTL is
/// simply content; the save proceeds with the default lifetime.
fn parse_save_args(args: &str) -> SaveArgs {
    let mut out = SaveArgs::default();
    let mut rest = args.trim_start();

    while !rest.is_empty() {
        let end = rest
            .find(char::is_whitespace)
            .unwrap_or(rest.len());
        let token = &rest[..end];

        if out.ttl.is_none() && TtlSpec::parse(token).is_some() {
            out.ttl = TtlSpec::parse(token);
        } else if token.eq_ignore_ascii_case("public") {
            out.is_public = true;
        } else if let Some(tag) = token.strip_prefix('#') {
            if tag.is_empty() {
                break;
            }
            out.tags.push(tag.to_string());
        } else {
            break;
        }

        rest = rest[end..].trim_start();
    }

    out.content = rest.trim_end().to_string();
    out
}

/// Headroom for the code line, metadata, and `<pre>` wrapper around a clip
/// body in a `/get` reply.
const GET_REPLY_OVERHEAD: usize = 512;

/// Longest prefix of `content` whose HTML-escaped form stays within
/// `budget` bytes. Clips can hold far more than one chat message; the
/// boundary between the two limits lives here.
fn fit_escaped(content: &str, budget: usize) -> (&str, bool) {
    let mut used = 0usize;
    for (idx, c) in content.char_indices() {
        let cost = match c {
            '&' => "&amp;".len(),
            '<' | '>' => "&lt;".len(),
            '"' => "&quot;".len(),
            _ => c.len_utf8(),
        };
        if used + cost > budget {
            return (&content[..idx], true);
        }
        used += cost;
    }
    (content, false)
}

pub async fn handle_command(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let (cmd, args) = parse_command(text);
    let chat_id = ChatId(msg.chat.id.0);
    let user_id = msg.from().map(|u| u.id.0 as i64);

    match cmd.as_str() {
        "save" | "clip" => cmd_save(&state, chat_id, user_id, &args).await,
        "get" | "show" => cmd_get(&state, chat_id, user_id, &args).await,
        "list" | "clips" => cmd_list(&state, chat_id, user_id, &args).await,
        "help" | "start" => {
            let _ = state.messenger.send_html(chat_id, HELP_HTML).await;
        }
        _ => {
            let _ = state
                .messenger
                .send_html(chat_id, "Unknown command. Try /help.")
                .await;
        }
    }

    Ok(())
}

const HELP_HTML: &str = "\
📎 <b>clipbot</b>: ephemeral text clips\n\n\
/save [ttl] [public] [#tag …] &lt;text&gt; store text, get a code\n\
  ttl: <code>10m</code>, <code>2h</code>, <code>3d</code> (default 7 days)\n\
/get &lt;code&gt; retrieve a clip by its code\n\
/list [page] your live clips, newest first\n\n\
Clips are private unless saved with <code>public</code>, and vanish when\n\
their time is up.";

async fn cmd_save(state: &AppState, chat_id: ChatId, user_id: Option<i64>, args: &str) {
    let Some(user_id) = user_id else {
        let _ = state
            .messenger
            .send_html(chat_id, "I can't tell who you are, so I can't save this.")
            .await;
        return;
    };

    let parsed = parse_save_args(args);
    if parsed.content.is_empty() {
        let _ = state
            .messenger
            .send_html(
                chat_id,
                "Usage: /save [ttl] [public] [#tag …] &lt;text&gt;",
            )
            .await;
        return;
    }

    let req = SaveRequest {
        content: parsed.content.clone(),
        owner: user_id.to_string(),
        ttl: parsed.ttl,
        tags: parsed.tags.clone(),
        is_public: parsed.is_public,
    };

    match state.store.put(req).await {
        Ok(receipt) => {
            let remaining = format_time_remaining(receipt.expires_at, Utc::now());
            let visibility = if parsed.is_public { "public" } else { "private" };
            let html = format!(
                "💾 Saved as <code>{}</code>\nExpires in {remaining} · {visibility}",
                escape_html(&receipt.code)
            );
            let _ = state.messenger.send_html(chat_id, &html).await;
            // Audit the content that was stored, not the raw argument
            // string with its option tokens.
            let _ = state
                .audit
                .write(AuditEvent::save(user_id, &receipt.code, &parsed.content));
        }
        Err(Error::Validation(reason)) => {
            let html = format!("⚠️ {}", escape_html(&reason));
            let _ = state.messenger.send_html(chat_id, &html).await;
        }
        Err(e) => {
            eprintln!("[SAVE] Unexpected store error: {e}");
            let _ = state
                .messenger
                .send_html(chat_id, "Something went wrong saving that.")
                .await;
        }
    }
}

async fn cmd_get(state: &AppState, chat_id: ChatId, user_id: Option<i64>, args: &str) {
    let code = args.trim().to_uppercase();
    if code.is_empty() {
        let _ = state
            .messenger
            .send_html(chat_id, "Usage: /get &lt;code&gt;")
            .await;
        return;
    }
    if !looks_like_code(&code) {
        let html = format!(
            "<code>{}</code> doesn't look like a clip code (expected CLIP-XXXXXX).",
            escape_html(&code)
        );
        let _ = state.messenger.send_html(chat_id, &html).await;
        return;
    }

    let caller = user_id.map(|id| id.to_string());
    match state.store.get(&code, caller.as_deref()).await {
        Ok(view) => {
            let remaining = format_time_remaining(view.expires_at, Utc::now());
            let mut meta = format!("expires in {remaining} · {} views", view.views);
            if !view.tags.is_empty() {
                meta.push_str(&format!(" · #{}", escape_html(&view.tags.join(" #"))));
            }

            let budget = state
                .messenger
                .capabilities()
                .max_message_len
                .saturating_sub(GET_REPLY_OVERHEAD);
            let (shown, cut) = fit_escaped(&view.content, budget);
            let mut body = escape_html(shown);
            if cut {
                body.push_str("\n… (truncated)");
            }

            let html = format!(
                "📎 <code>{}</code> ({meta})\n<pre>{body}</pre>",
                escape_html(&view.id)
            );
            let _ = state.messenger.send_html(chat_id, &html).await;
            if let Some(id) = user_id {
                let _ = state.audit.write(AuditEvent::fetch(id, &code));
            }
        }
        Err(Error::NotFound) => {
            let html = format!("No clip with code <code>{}</code>.", escape_html(&code));
            let _ = state.messenger.send_html(chat_id, &html).await;
        }
        Err(Error::Expired) => {
            let html = format!(
                "⏱ Clip <code>{}</code> has expired and was removed.",
                escape_html(&code)
            );
            let _ = state.messenger.send_html(chat_id, &html).await;
        }
        Err(Error::AccessDenied) => {
            let _ = state
                .messenger
                .send_html(chat_id, "🔒 That clip is private.")
                .await;
            if let Some(id) = user_id {
                let _ = state.audit.write(AuditEvent::denied(id, &code, "private"));
            }
        }
        Err(e) => {
            eprintln!("[GET] Unexpected store error: {e}");
            let _ = state
                .messenger
                .send_html(chat_id, "Something went wrong fetching that.")
                .await;
        }
    }
}

async fn cmd_list(state: &AppState, chat_id: ChatId, user_id: Option<i64>, args: &str) {
    let Some(user_id) = user_id else {
        let _ = state
            .messenger
            .send_html(chat_id, "I can't tell who you are, so I can't list your clips.")
            .await;
        return;
    };

    let page = args.trim().parse::<usize>().unwrap_or(1);
    let owner = user_id.to_string();
    let result = state
        .store
        .list(&owner, page, state.cfg.list_page_size)
        .await;

    let _ = state
        .messenger
        .send_html(chat_id, &render_list(&result))
        .await;
}

fn render_list(page: &ClipPage) -> String {
    if page.total == 0 {
        return "You have no live clips. /save something!".to_string();
    }
    if page.items.is_empty() {
        return format!(
            "Nothing on page {}: you have {} pages.",
            page.page, page.total_pages
        );
    }

    let now = Utc::now();
    let mut lines = Vec::with_capacity(page.items.len() + 2);
    lines.push(format!("📋 <b>Your clips</b> ({} live)", page.total));

    for item in &page.items {
        let remaining = format_time_remaining(item.expires_at, now);
        let mut line = format!(
            "• <code>{}</code> {} · {}",
            escape_html(&item.id),
            escape_html(&item.preview),
            remaining
        );
        if !item.tags.is_empty() {
            line.push_str(&format!(" #{}", escape_html(&item.tags.join(" #"))));
        }
        lines.push(line);
    }

    let mut footer = format!("Page {}/{}", page.page, page.total_pages);
    if page.has_next {
        footer.push_str(&format!(" · /list {}", page.page + 1));
    }
    lines.push(footer);

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    use async_trait::async_trait;
    use clipbot_core::{
        audit::AuditLogger,
        config::Config,
        domain::{MessageId, MessageRef},
        expiry::TtlUnit,
        messaging::{port::MessagingPort, types::MessagingCapabilities},
        store::ClipStore,
    };
    use tokio::sync::Mutex;

    struct CaptureMessenger {
        max_len: usize,
        sent: Mutex<Vec<String>>,
    }

    impl CaptureMessenger {
        fn new(max_len: usize) -> Arc<Self> {
            Arc::new(Self {
                max_len,
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MessagingPort for CaptureMessenger {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities {
                supports_html: true,
                max_message_len: self.max_len,
            }
        }

        async fn send_html(&self, chat_id: ChatId, html: &str) -> clipbot_core::Result<MessageRef> {
            self.sent.lock().await.push(html.to_string());
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }
    }

    fn tmp_file(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}.log"))
    }

    fn test_state(messenger: Arc<CaptureMessenger>, audit_path: PathBuf) -> Arc<AppState> {
        Arc::new(AppState {
            cfg: Arc::new(Config {
                telegram_bot_token: "test-token".to_string(),
                telegram_allowed_users: vec![],
                sweep_interval: std::time::Duration::from_secs(3600),
                list_page_size: 10,
                preview_length: 80,
                audit_log_path: audit_path.clone(),
                audit_log_json: true,
            }),
            store: ClipStore::default(),
            messenger,
            audit: Arc::new(AuditLogger::new(audit_path, true)),
        })
    }

    #[test]
    fn parse_command_strips_botname_and_lowercases() {
        let (cmd, args) = parse_command("/Save@clipbot hello world");
        assert_eq!(cmd, "save");
        assert_eq!(args, "hello world");
    }

    #[test]
    fn save_args_pick_up_leading_options() {
        let parsed = parse_save_args("2h public #notes remember the milk");
        assert_eq!(
            parsed.ttl,
            Some(TtlSpec {
                value: 2,
                unit: TtlUnit::Hour
            })
        );
        assert!(parsed.is_public);
        assert_eq!(parsed.tags, vec!["notes"]);
        assert_eq!(parsed.content, "remember the milk");
    }

    #[test]
    fn save_args_without_options_are_all_content() {
        let parsed = parse_save_args("just some text with 10m in the middle");
        assert_eq!(parsed.ttl, None);
        assert!(!parsed.is_public);
        assert_eq!(parsed.content, "just some text with 10m in the middle");
    }

    #[test]
    fn save_args_first_token_ttl_is_consumed() {
        let parsed = parse_save_args("10m call mom");
        assert!(parsed.ttl.is_some());
        assert_eq!(parsed.content, "call mom");
    }

    #[test]
    fn save_args_unparseable_ttl_token_is_content() {
        // "Never block a save": an odd token falls through to content and
        // the default lifetime applies.
        let parsed = parse_save_args("10q call mom");
        assert_eq!(parsed.ttl, None);
        assert_eq!(parsed.content, "10q call mom");
    }

    #[test]
    fn save_args_preserve_content_newlines() {
        let parsed = parse_save_args("public line one\nline two");
        assert!(parsed.is_public);
        assert_eq!(parsed.content, "line one\nline two");
    }

    #[test]
    fn fit_escaped_counts_entity_expansion() {
        // "<" costs four bytes once escaped, so "a<b" overflows a budget
        // of five at the final character.
        let (kept, cut) = fit_escaped("a<b", 5);
        assert_eq!(kept, "a<");
        assert!(cut);
        assert!(escape_html(kept).len() <= 5);

        let (all, cut) = fit_escaped("a<b", 6);
        assert_eq!(all, "a<b");
        assert!(!cut);
    }

    #[test]
    fn fit_escaped_never_splits_a_char() {
        let (kept, cut) = fit_escaped("héllo", 3);
        assert_eq!(kept, "hé");
        assert!(cut);
    }

    #[tokio::test]
    async fn save_audits_the_stored_content_not_the_option_tokens() {
        let messenger = CaptureMessenger::new(4096);
        let state = test_state(messenger.clone(), tmp_file("clipbot-cmd-save"));

        cmd_save(&state, ChatId(1), Some(42), "2h public #notes remember the milk").await;

        let written = std::fs::read_to_string(state.audit.path()).unwrap();
        assert!(written.contains("\"save\""));
        assert!(written.contains("remember the milk"));
        assert!(!written.contains("#notes"));
        assert!(!written.contains("2h public"));

        let sent = messenger.sent.lock().await;
        assert!(sent[0].contains("Saved as"));
    }

    #[tokio::test]
    async fn get_reply_respects_the_messenger_length_limit() {
        let messenger = CaptureMessenger::new(1024);
        let state = test_state(messenger.clone(), tmp_file("clipbot-cmd-get"));

        let receipt = state
            .store
            .put(SaveRequest {
                content: "x".repeat(5000),
                owner: "42".to_string(),
                ttl: None,
                tags: Vec::new(),
                is_public: false,
            })
            .await
            .unwrap();

        cmd_get(&state, ChatId(1), Some(42), &receipt.code).await;

        let sent = messenger.sent.lock().await;
        let reply = sent.last().unwrap();
        assert!(reply.len() <= 1024);
        assert!(reply.contains("truncated"));
        assert!(reply.contains(&receipt.code));
    }

    #[tokio::test]
    async fn get_reply_leaves_short_clips_whole() {
        let messenger = CaptureMessenger::new(4096);
        let state = test_state(messenger.clone(), tmp_file("clipbot-cmd-get-short"));

        let receipt = state
            .store
            .put(SaveRequest {
                content: "short and sweet".to_string(),
                owner: "42".to_string(),
                ttl: None,
                tags: Vec::new(),
                is_public: false,
            })
            .await
            .unwrap();

        cmd_get(&state, ChatId(1), Some(42), &receipt.code).await;

        let sent = messenger.sent.lock().await;
        let reply = sent.last().unwrap();
        assert!(reply.contains("short and sweet"));
        assert!(!reply.contains("truncated"));
    }

    #[test]
    fn render_list_handles_the_empty_page() {
        let page = ClipPage {
            items: vec![],
            page: 1,
            limit: 10,
            total: 0,
            total_pages: 0,
            has_next: false,
            has_prev: false,
        };
        assert!(render_list(&page).contains("no live clips"));
    }

    #[test]
    fn render_list_shows_footer_and_next_page_hint() {
        let item = clipbot_core::store::ClipPreview {
            id: "CLIP-ABCDEF".to_string(),
            preview: "hello".to_string(),
            created_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::days(1),
            tags: vec!["notes".to_string()],
            views: 3,
        };
        let page = ClipPage {
            items: vec![item],
            page: 1,
            limit: 1,
            total: 2,
            total_pages: 2,
            has_next: true,
            has_prev: false,
        };
        let html = render_list(&page);
        assert!(html.contains("CLIP-ABCDEF"));
        assert!(html.contains("#notes"));
        assert!(html.contains("Page 1/2"));
        assert!(html.contains("/list 2"));
    }
}
