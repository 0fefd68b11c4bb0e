use crate::config::Config;
use crate::db::Db;
use crate::service::ProxyService;
use crate::settings::SettingsStore;
use std::collections::HashMap;
use std::sync::Arc;
use teloxide::types::Message;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct BotState {
    pub config: Arc<Config>,
    pub settings: Arc<SettingsStore>,
    pub proxies: ProxyService,
    pub db: Arc<Db>,
    pub sessions: Sessions,
}

/// Какой ответ ждём от чата следующим текстовым сообщением.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    AwaitDeleteId,
    SetIp,
    SetDns,
    SetPort,
    NewProxyPort,
}

#[derive(Clone, Default)]
pub struct Sessions {
    modes: Arc<Mutex<HashMap<i64, SessionMode>>>,
}

impl Sessions {
    pub async fn set(&self, chat_id: i64, mode: SessionMode) {
        self.modes.lock().await.insert(chat_id, mode);
    }

    pub async fn get(&self, chat_id: i64) -> Option<SessionMode> {
        self.modes.lock().await.get(&chat_id).copied()
    }

    pub async fn clear(&self, chat_id: i64) -> Option<SessionMode> {
        self.modes.lock().await.remove(&chat_id)
    }
}

pub fn sender_user_id(msg: &Message) -> Option<i64> {
    msg.from.as_ref().map(|user| user.id.0 as i64)
}

pub fn is_admin_message(msg: &Message, state: &BotState) -> bool {
    sender_user_id(msg).is_some_and(|user_id| state.config.is_admin(user_id))
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::scripts::fake::FakeScripts;

    pub const ADMIN_ID: i64 = 42;

    /// Состояние бота на временных файлах и поддельных скриптах.
    pub async fn state_with(scripts: FakeScripts) -> (BotState, Arc<FakeScripts>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            admin_ids: vec![ADMIN_ID],
            project_root: dir.path().to_path_buf(),
            ..Config::default()
        };
        let scripts = Arc::new(scripts);
        let state = BotState {
            settings: Arc::new(SettingsStore::open(dir.path().join("config.json"))),
            proxies: ProxyService::new(scripts.clone()),
            db: Arc::new(Db::open(dir.path().join("journal.db")).await.unwrap()),
            sessions: Sessions::default(),
            config: Arc::new(config),
        };
        (state, scripts, dir)
    }
}
