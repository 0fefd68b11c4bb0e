//! mtproxy-admin — Telegram-бот для управления MTProxy через shell-скрипты.

mod bot;
mod config;
mod db;
mod link;
mod proxy;
mod scripts;
mod service;
mod settings;

use std::path::PathBuf;
use std::sync::Arc;
use teloxide::dispatching::Dispatcher;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/etc/mtproxy-admin.toml"));
    tracing::info!(
        "Starting mtproxy-admin with config {}",
        config_path.display()
    );

    let config = Arc::new(config::Config::load(&config_path)?);
    let token = match config.bot_token() {
        Ok(token) => token,
        Err(error) => {
            tracing::error!(error = %error, "Bot token is missing, refusing to start");
            return Err(error.into());
        }
    };
    let scripts_dir = config.resolve(&config.scripts_dir);
    let settings_path = config.resolve(&config.settings_path);
    let db_path = config.resolve(&config.db_path);
    tracing::info!(
        admin_count = config.admin_ids.len(),
        project_root = %config.project_root.display(),
        scripts_dir = %scripts_dir.display(),
        settings_path = %settings_path.display(),
        db_path = %db_path.display(),
        page_size = config.page_size,
        script_timeout_secs = config.script_timeout_secs,
        "Configuration loaded"
    );
    if config.admin_ids.is_empty() {
        tracing::warn!("admin_ids is empty, nobody will be able to use the bot");
    }

    let runner = scripts::ShellScripts::new(
        config.project_root.clone(),
        scripts_dir,
        config.script_timeout(),
    );
    let state = bot::handlers::BotState {
        settings: Arc::new(settings::SettingsStore::open(settings_path)),
        proxies: service::ProxyService::new(Arc::new(runner)),
        db: Arc::new(db::Db::open(&db_path).await?),
        sessions: bot::handlers::Sessions::default(),
        config,
    };

    let bot = Bot::new(token);
    if let Err(error) = bot
        .set_my_commands(bot::handlers::BotCommand::bot_commands())
        .await
    {
        tracing::warn!(error = %error, "Failed to register bot commands");
    }
    tracing::info!("Dispatcher initialized, bot is ready");

    Dispatcher::builder(bot, bot::handlers::schema())
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
