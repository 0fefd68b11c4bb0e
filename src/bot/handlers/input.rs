//! Многошаговый ввод: следующий текст из чата — ответ на последний запрос.

use super::format::render_admin_error;
use super::shared::{create_proxy_reply, delete_proxy_reply, settings_reply, Reply};
use super::state::{BotState, SessionMode};
use crate::bot::keyboards;
use crate::service::{parse_port_input, AdminError, PortChoice};
use crate::settings::Settings;
use std::net::IpAddr;

const CLEAR_VALUE: &str = "-";
const MAX_DNS_LEN: usize = 253;

pub fn prompt_text(mode: SessionMode) -> &'static str {
    match mode {
        SessionMode::AwaitDeleteId => "Отправьте ID прокси, который нужно удалить.",
        SessionMode::SetIp => "Отправьте публичный IP сервера, например 203.0.113.10.",
        SessionMode::SetDns => "Отправьте DNS-имя сервера или «-», чтобы очистить.",
        SessionMode::SetPort => "Отправьте порт по умолчанию (1–65535).",
        SessionMode::NewProxyPort => "Отправьте порт для нового прокси (1–65535) или auto.",
    }
}

pub async fn begin_input(state: &BotState, chat_id: i64, mode: SessionMode) -> Reply {
    state.sessions.set(chat_id, mode).await;
    tracing::info!(chat_id = chat_id, mode = ?mode, "Waiting for text input");
    Reply::new(prompt_text(mode), keyboards::cancel_keyboard())
}

fn retry(message: &str) -> Reply {
    Reply::new(
        format!("{}\nПопробуйте ещё раз или нажмите «Отмена».", message),
        keyboards::cancel_keyboard(),
    )
}

/// `None`, если чат ничего не ждёт. При ошибке проверки или сохранения режим
/// сохраняется.
pub async fn consume_pending_input(
    state: &BotState,
    chat_id: i64,
    admin_id: i64,
    text: &str,
) -> Option<Reply> {
    let mode = state.sessions.get(chat_id).await?;
    let text = text.trim();
    tracing::info!(chat_id = chat_id, mode = ?mode, "Consuming text input");

    let reply = match mode {
        SessionMode::SetPort => match parse_port_input(text) {
            Ok(port) => {
                save_setting(
                    state,
                    chat_id,
                    |settings| settings.default_port = port,
                    format!("Порт по умолчанию: {}", port),
                )
                .await
            }
            Err(error) => retry(&render_admin_error(&error)),
        },
        SessionMode::SetIp => match text.parse::<IpAddr>() {
            Ok(ip) => {
                save_setting(
                    state,
                    chat_id,
                    |settings| settings.public_host = ip.to_string(),
                    format!("IP сервера: {}", ip),
                )
                .await
            }
            Err(_) => retry("Некорректный IP-адрес."),
        },
        SessionMode::SetDns => match parse_dns_input(text) {
            Ok(dns) => {
                let shown = if dns.is_empty() { "очищено".to_string() } else { dns.clone() };
                save_setting(
                    state,
                    chat_id,
                    |settings| settings.dns_name = dns,
                    format!("DNS-имя: {}", shown),
                )
                .await
            }
            Err(error) => retry(&render_admin_error(&error)),
        },
        SessionMode::NewProxyPort => match PortChoice::parse(text) {
            Ok(choice) => {
                state.sessions.clear(chat_id).await;
                create_proxy_reply(state, admin_id, choice).await
            }
            Err(error) => retry(&render_admin_error(&error)),
        },
        SessionMode::AwaitDeleteId => {
            if text.is_empty() || text.contains(char::is_whitespace) {
                retry("ID прокси — одно слово, например: 3")
            } else {
                state.sessions.clear(chat_id).await;
                delete_proxy_reply(state, admin_id, text).await
            }
        }
    };
    Some(reply)
}

async fn save_setting<F>(state: &BotState, chat_id: i64, apply: F, message: String) -> Reply
where
    F: FnOnce(&mut Settings),
{
    match state.settings.update(apply).await {
        Ok(_) => {
            state.sessions.clear(chat_id).await;
            let mut reply = settings_reply(state).await;
            reply.text = format!("✅ Сохранено. {}\n\n{}", message, reply.text);
            reply
        }
        Err(error) => {
            tracing::error!(chat_id = chat_id, error = %error, "Failed to save settings");
            retry(&format!("⚠️ {}", error))
        }
    }
}

fn parse_dns_input(text: &str) -> Result<String, AdminError> {
    if text == CLEAR_VALUE {
        return Ok(String::new());
    }
    let name = text.trim_end_matches('.').to_ascii_lowercase();
    let valid = !name.is_empty()
        && name.len() <= MAX_DNS_LEN
        && name.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
    if valid {
        Ok(name)
    } else {
        Err(AdminError::Validation("Некорректное DNS-имя.".to_string()))
    }
}
