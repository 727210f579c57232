use std::sync::Arc;

use clipbot_core::{audit::AuditLogger, config::Config, store::ClipStore, sweep::SweepScheduler};

#[tokio::main]
async fn main() -> Result<(), clipbot_core::Error> {
    clipbot_core::logging::init("clipbot")?;

    let cfg = Arc::new(Config::load()?);

    let audit = Arc::new(AuditLogger::new(
        cfg.audit_log_path.clone(),
        cfg.audit_log_json,
    ));

    let store = ClipStore::new(cfg.preview_length);
    let sweeper = SweepScheduler::new(store.clone(), cfg.sweep_interval, Some(audit.clone()));
    sweeper.start().await;

    let result = clipbot_telegram::router::run_polling(cfg, store, audit)
        .await
        .map_err(|e| clipbot_core::Error::External(format!("telegram bot failed: {e}")));

    sweeper.stop().await;
    result
}
