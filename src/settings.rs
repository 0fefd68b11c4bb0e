//! Настройки прокси (publicHost / dnsName / defaultPort) в JSON-файле.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

pub const DEFAULT_PORT: u16 = 443;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub public_host: String,
    pub dns_name: String,
    pub default_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            public_host: String::new(),
            dns_name: String::new(),
            default_port: DEFAULT_PORT,
        }
    }
}

impl Settings {
    /// Адрес для ссылок: DNS-имя предпочтительнее IP.
    pub fn server_host(&self) -> Option<&str> {
        [self.dns_name.as_str(), self.public_host.as_str()]
            .into_iter()
            .map(str::trim)
            .find(|value| !value.is_empty())
    }
}

pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<Settings>,
}

impl SettingsStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = read_settings(&path);
        tracing::info!(
            path = %path.display(),
            public_host = %current.public_host,
            dns_name = %current.dns_name,
            default_port = current.default_port,
            "Settings loaded"
        );
        Self {
            path,
            current: RwLock::new(current),
        }
    }

    pub async fn get(&self) -> Settings {
        self.current.read().await.clone()
    }

    /// Применяет изменение, сохраняет файл и заменяет значение целиком.
    pub async fn update<F>(&self, apply: F) -> Result<Settings, anyhow::Error>
    where
        F: FnOnce(&mut Settings),
    {
        let mut guard = self.current.write().await;
        let mut next = guard.clone();
        apply(&mut next);
        write_settings(&self.path, &next)?;
        *guard = next.clone();
        tracing::info!(
            public_host = %next.public_host,
            dns_name = %next.dns_name,
            default_port = next.default_port,
            "Settings updated"
        );
        Ok(next)
    }
}

/// Отсутствующий или битый файл заменяется значениями по умолчанию,
/// некорректный ключ заменяется только сам.
pub fn read_settings(path: &Path) -> Settings {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            if error.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %error, "Failed to read settings file");
            }
            return Settings::default();
        }
    };
    match serde_json::from_str::<Value>(&raw) {
        Ok(value) => {
            let defaults = Settings::default();
            Settings {
                public_host: field(&value, "publicHost", path).unwrap_or(defaults.public_host),
                dns_name: field(&value, "dnsName", path).unwrap_or(defaults.dns_name),
                default_port: field(&value, "defaultPort", path)
                    .filter(|port: &u16| *port != 0)
                    .unwrap_or(defaults.default_port),
            }
        }
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "Settings file is corrupt, using defaults"
            );
            Settings::default()
        }
    }
}

fn field<T: DeserializeOwned>(value: &Value, key: &str, path: &Path) -> Option<T> {
    let raw = value.get(key)?;
    match serde_json::from_value(raw.clone()) {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                key = key,
                error = %error,
                "Invalid settings value, using default"
            );
            None
        }
    }
}

pub fn write_settings(path: &Path, settings: &Settings) -> Result<(), anyhow::Error> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow::anyhow!("Не удалось создать директорию для настроек: {}", e))?;
    }
    let body = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, body)
        .map_err(|e| anyhow::anyhow!("Не удалось сохранить настройки {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_is_merged_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"publicHost":"1.2.3.4"}"#).unwrap();

        let settings = read_settings(&path);
        assert_eq!(
            settings,
            Settings {
                public_host: "1.2.3.4".to_string(),
                dns_name: String::new(),
                default_port: DEFAULT_PORT,
            }
        );
    }

    #[test]
    fn missing_and_corrupt_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert_eq!(read_settings(&missing), Settings::default());

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "{not json").unwrap();
        assert_eq!(read_settings(&corrupt), Settings::default());
    }

    #[test]
    fn invalid_key_does_not_reset_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"publicHost":"1.2.3.4","dnsName":42,"defaultPort":70000}"#,
        )
        .unwrap();

        let settings = read_settings(&path);
        assert_eq!(settings.public_host, "1.2.3.4");
        assert_eq!(settings.dns_name, "");
        assert_eq!(settings.default_port, DEFAULT_PORT);

        std::fs::write(&path, "[1, 2]").unwrap();
        assert_eq!(read_settings(&path), Settings::default());
    }

    #[test]
    fn file_uses_camel_case_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let settings = Settings {
            public_host: "10.0.0.1".to_string(),
            dns_name: "proxy.example.com".to_string(),
            default_port: 8443,
        };
        write_settings(&path, &settings).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["publicHost"], "10.0.0.1");
        assert_eq!(raw["dnsName"], "proxy.example.com");
        assert_eq!(raw["defaultPort"], 8443);
    }

    #[test]
    fn server_host_prefers_dns() {
        let mut settings = Settings {
            public_host: "1.2.3.4".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.server_host(), Some("1.2.3.4"));
        settings.dns_name = "proxy.example.com".to_string();
        assert_eq!(settings.server_host(), Some("proxy.example.com"));
        assert_eq!(Settings::default().server_host(), None);
    }

    #[tokio::test]
    async fn update_persists_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let store = SettingsStore::open(&path);

        store
            .update(|settings| settings.public_host = "1.2.3.4".to_string())
            .await
            .unwrap();

        assert_eq!(store.get().await.public_host, "1.2.3.4");
        let reloaded = SettingsStore::open(&path).get().await;
        assert_eq!(reloaded.public_host, "1.2.3.4");
        assert_eq!(reloaded.dns_name, "");
        assert_eq!(reloaded.default_port, DEFAULT_PORT);
    }
}
