//! Операции над прокси поверх shell-скриптов.

use crate::link::build_proxy_link;
use crate::proxy::{
    parse_delete_outcome, parse_proxy_list, parse_stats, DeleteOutcome, ProxyRecord, ProxyStats,
};
use crate::scripts::{
    manual_command, ScriptError, ScriptRunner, DELETE_PROXY, LIST_PROXIES, NEW_PROXY, STATS_PROXY,
};
use crate::settings::Settings;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("{source}")]
    Script {
        source: ScriptError,
        manual: String,
    },
    #[error("{0}")]
    Validation(String),
    #[error("Прокси {0} не найден")]
    NotFound(String),
    #[error("Неожиданный вывод {script}: {output}")]
    UnexpectedOutput {
        script: &'static str,
        output: String,
        manual: String,
    },
}

impl AdminError {
    /// Команда для ручного запуска на сервере, если ошибка связана со скриптом.
    pub fn manual_command(&self) -> Option<&str> {
        match self {
            Self::Script { manual, .. } | Self::UnexpectedOutput { manual, .. } => Some(manual),
            Self::Validation(_) | Self::NotFound(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortChoice {
    Default,
    Auto,
    Fixed(u16),
}

impl PortChoice {
    /// `auto` или номер порта 1..=65535.
    pub fn parse(input: &str) -> Result<Self, AdminError> {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        parse_port_input(trimmed).map(Self::Fixed)
    }
}

pub fn parse_port_input(input: &str) -> Result<u16, AdminError> {
    match input.trim().parse::<u32>() {
        Ok(value) if (1..=65535).contains(&value) => Ok(value as u16),
        Ok(_) => Err(AdminError::Validation(
            "Порт должен быть в диапазоне 1–65535.".to_string(),
        )),
        Err(_) => Err(AdminError::Validation(
            "Порт должен быть числом от 1 до 65535.".to_string(),
        )),
    }
}

#[derive(Debug, Clone)]
pub struct CreatedProxy {
    pub record: ProxyRecord,
    pub link: String,
}

#[derive(Clone)]
pub struct ProxyService {
    runner: Arc<dyn ScriptRunner>,
}

impl ProxyService {
    pub fn new(runner: Arc<dyn ScriptRunner>) -> Self {
        Self { runner }
    }

    async fn run(&self, script: &'static str, args: Vec<String>) -> Result<String, AdminError> {
        self.runner
            .invoke(script, &args)
            .await
            .map_err(|source| AdminError::Script {
                source,
                manual: manual_command(script, &args),
            })
    }

    pub async fn create(
        &self,
        settings: &Settings,
        port: PortChoice,
    ) -> Result<CreatedProxy, AdminError> {
        let args = new_proxy_args(settings, port);
        let manual = manual_command(NEW_PROXY, &args);
        let output = self.run(NEW_PROXY, args).await?;
        let Some(record) = parse_proxy_list(&output).into_iter().next() else {
            tracing::warn!(output = %output, "new_proxy.sh produced no record line");
            return Err(AdminError::UnexpectedOutput {
                script: NEW_PROXY,
                output,
                manual,
            });
        };
        let link = build_proxy_link(settings, record.secret.as_deref(), record.port);
        tracing::info!(proxy_id = %record.id, port = ?record.port, "Proxy created");
        Ok(CreatedProxy { record, link })
    }

    pub async fn list(&self) -> Result<Vec<ProxyRecord>, AdminError> {
        let output = self.run(LIST_PROXIES, Vec::new()).await?;
        Ok(parse_proxy_list(&output))
    }

    pub async fn find(&self, id: &str) -> Result<ProxyRecord, AdminError> {
        self.list()
            .await?
            .into_iter()
            .find(|record| record.id == id)
            .ok_or_else(|| AdminError::NotFound(id.to_string()))
    }

    pub async fn delete(&self, id: &str) -> Result<(), AdminError> {
        let id = validate_proxy_id(id)?;
        let args = vec![id.to_string()];
        let manual = manual_command(DELETE_PROXY, &args);
        let output = self.run(DELETE_PROXY, args).await?;
        match parse_delete_outcome(&output) {
            DeleteOutcome::Deleted => {
                tracing::info!(proxy_id = id, "Proxy deleted");
                Ok(())
            }
            DeleteOutcome::NotFound => Err(AdminError::NotFound(id.to_string())),
            DeleteOutcome::Unrecognized(output) => {
                tracing::warn!(proxy_id = id, output = %output, "delete_proxy.sh returned unexpected output");
                Err(AdminError::UnexpectedOutput {
                    script: DELETE_PROXY,
                    output,
                    manual,
                })
            }
        }
    }

    pub async fn stats(&self) -> Result<(ProxyStats, String), AdminError> {
        let output = self.run(STATS_PROXY, Vec::new()).await?;
        Ok((parse_stats(&output), output))
    }
}

fn validate_proxy_id(id: &str) -> Result<&str, AdminError> {
    let id = id.trim();
    if id.is_empty() || id.contains(char::is_whitespace) {
        return Err(AdminError::Validation(
            "Укажите ID прокси одним словом, например: 3".to_string(),
        ));
    }
    Ok(id)
}

fn new_proxy_args(settings: &Settings, port: PortChoice) -> Vec<String> {
    let mut args = Vec::new();
    let host = settings.public_host.trim();
    if !host.is_empty() {
        args.push("--host".to_string());
        args.push(host.to_string());
    }
    let dns = settings.dns_name.trim();
    if !dns.is_empty() {
        args.push("--dns".to_string());
        args.push(dns.to_string());
    }
    args.push("--port".to_string());
    args.push(match port {
        PortChoice::Default => settings.default_port.to_string(),
        PortChoice::Auto => "auto".to_string(),
        PortChoice::Fixed(port) => port.to_string(),
    });
    args
}
