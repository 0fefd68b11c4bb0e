//! Загрузочная конфигурация бота (TOML).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const TOKEN_PLACEHOLDER: &str = "TOKEN_HERE";
const TOKEN_ENV: &str = "MTPROXY_BOT_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Не удалось прочитать конфиг {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Некорректный TOML в {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Токен бота не задан (bot_token или MTPROXY_BOT_TOKEN)")]
    MissingToken,
    #[error("page_size должен быть больше нуля")]
    InvalidPageSize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bot_token: Option<String>,
    pub admin_ids: Vec<i64>,
    pub project_root: PathBuf,
    pub scripts_dir: PathBuf,
    pub settings_path: PathBuf,
    pub db_path: PathBuf,
    pub page_size: usize,
    pub script_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: None,
            admin_ids: Vec::new(),
            project_root: PathBuf::from("/opt/mtproxy-admin"),
            scripts_dir: PathBuf::from("scripts"),
            settings_path: PathBuf::from("config.json"),
            db_path: PathBuf::from("data/mtproxy-admin.db"),
            page_size: 8,
            script_timeout_secs: 60,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if config.page_size == 0 {
            return Err(ConfigError::InvalidPageSize);
        }
        Ok(config)
    }

    fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Токен из окружения имеет приоритет над файлом.
    pub fn bot_token(&self) -> Result<String, ConfigError> {
        let from_env = std::env::var(TOKEN_ENV).ok();
        resolve_token(from_env.as_deref(), self.bot_token.as_deref())
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout_secs.max(1))
    }

    /// Относительные пути считаются от `project_root`.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}

fn resolve_token(from_env: Option<&str>, from_file: Option<&str>) -> Result<String, ConfigError> {
    [from_env, from_file]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|token| !token.is_empty() && *token != TOKEN_PLACEHOLDER)
        .map(str::to_string)
        .ok_or(ConfigError::MissingToken)
}
