use super::format::{
    render_admin_error, render_created_text, render_delete_text, render_history_text,
    render_list_text, render_settings_text, render_stats_text,
};
use super::state::BotState;
use crate::bot::keyboards::{self, Page};
use crate::db::ProxyAction;
use crate::link::build_proxy_link;
use crate::service::{AdminError, PortChoice};
use anyhow::anyhow;
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;
use std::io::Cursor;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, InputFile, MessageId};

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const HISTORY_LIMIT: i64 = 15;

/// Текст ответа и клавиатура к нему.
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub markup: InlineKeyboardMarkup,
}

impl Reply {
    pub fn new(text: impl Into<String>, markup: InlineKeyboardMarkup) -> Self {
        Self {
            text: text.into(),
            markup,
        }
    }
}

pub async fn send_reply(bot: &Bot, chat_id: ChatId, reply: Reply) -> HandlerResult {
    bot.send_message(chat_id, reply.text)
        .reply_markup(reply.markup)
        .await?;
    Ok(())
}

/// Редактирует сообщение с меню; без message_id отправляет новое.
pub async fn show_reply(
    bot: &Bot,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    reply: Reply,
) -> HandlerResult {
    match message_id {
        Some(message_id) => {
            if let Err(error) = bot
                .edit_message_text(chat_id, message_id, reply.text.clone())
                .reply_markup(reply.markup.clone())
                .await
            {
                tracing::debug!(error = %error, "Edit failed, sending a new message");
                send_reply(bot, chat_id, reply).await?;
            }
        }
        None => send_reply(bot, chat_id, reply).await?,
    }
    Ok(())
}

pub fn error_reply(error: &AdminError) -> Reply {
    Reply::new(render_admin_error(error), keyboards::back_keyboard())
}

fn log_admin_error(context: &str, error: &AdminError) {
    match error {
        AdminError::Script { .. } | AdminError::UnexpectedOutput { .. } => {
            tracing::error!(error = %error, "{} failed", context);
        }
        AdminError::Validation(_) | AdminError::NotFound(_) => {
            tracing::info!(error = %error, "{} rejected", context);
        }
    }
}

pub async fn proxy_list_reply(state: &BotState, requested_page: usize) -> Reply {
    let records = match state.proxies.list().await {
        Ok(records) => records,
        Err(error) => {
            log_admin_error("Proxy list", &error);
            return error_reply(&error);
        }
    };
    let settings = state.settings.get().await;
    let page = Page::new(records.len(), state.config.page_size, requested_page);
    let link_for = |record: &crate::proxy::ProxyRecord| {
        build_proxy_link(&settings, record.secret.as_deref(), record.port)
    };
    let text = render_list_text(
        &records,
        page.start,
        page.end,
        (page.index, page.total_pages),
        link_for,
    );
    let markup = keyboards::proxy_list_keyboard(&records, page, link_for);
    Reply::new(text, markup)
}

pub async fn delete_page_reply(state: &BotState, requested_page: usize) -> Reply {
    let records = match state.proxies.list().await {
        Ok(records) => records,
        Err(error) => {
            log_admin_error("Proxy list", &error);
            return error_reply(&error);
        }
    };
    let page = Page::new(records.len(), state.config.page_size, requested_page);
    Reply::new(
        render_delete_text(records.len(), (page.index, page.total_pages)),
        keyboards::delete_page_keyboard(&records, page),
    )
}

pub async fn status_reply(state: &BotState) -> Reply {
    match state.proxies.stats().await {
        Ok((stats, raw)) => Reply::new(render_stats_text(&stats, &raw), keyboards::back_keyboard()),
        Err(error) => {
            log_admin_error("Proxy stats", &error);
            error_reply(&error)
        }
    }
}

pub async fn settings_reply(state: &BotState) -> Reply {
    let settings = state.settings.get().await;
    Reply::new(render_settings_text(&settings), keyboards::settings_menu())
}

pub async fn history_reply(state: &BotState) -> Reply {
    let journal = async {
        let events = state.db.recent_events(HISTORY_LIMIT).await?;
        let stats = state.db.stats().await?;
        Ok::<_, anyhow::Error>(render_history_text(&events, &stats))
    };
    match journal.await {
        Ok(text) => Reply::new(text, keyboards::back_keyboard()),
        Err(error) => {
            tracing::error!(error = %error, "Failed to read journal");
            Reply::new(
                format!("⚠️ Не удалось прочитать журнал: {}", error),
                keyboards::back_keyboard(),
            )
        }
    }
}

pub async fn new_proxy_prompt(state: &BotState) -> Reply {
    let settings = state.settings.get().await;
    Reply::new(
        format!(
            "Введите порт для нового прокси (1–65535) или auto.\nПорт по умолчанию: {}",
            settings.default_port
        ),
        keyboards::new_proxy_port_buttons(settings.default_port),
    )
}

async fn journal(state: &BotState, action: ProxyAction, proxy_id: &str, port: Option<u16>, admin_id: i64) {
    if let Err(error) = state.db.record(action, proxy_id, port, admin_id).await {
        tracing::warn!(
            action = %action,
            proxy_id = proxy_id,
            error = %error,
            "Failed to write journal entry"
        );
    }
}

pub async fn create_proxy_reply(state: &BotState, admin_id: i64, port: PortChoice) -> Reply {
    let settings = state.settings.get().await;
    tracing::info!(admin_id = admin_id, port = ?port, "Creating proxy");
    match state.proxies.create(&settings, port).await {
        Ok(created) => {
            journal(
                state,
                ProxyAction::Created,
                &created.record.id,
                created.record.port,
                admin_id,
            )
            .await;
            Reply::new(
                render_created_text(&created.record, &created.link),
                keyboards::created_proxy_buttons(&created.record, &created.link),
            )
        }
        Err(error) => {
            log_admin_error("Proxy creation", &error);
            error_reply(&error)
        }
    }
}

pub async fn delete_proxy_reply(state: &BotState, admin_id: i64, proxy_id: &str) -> Reply {
    tracing::info!(admin_id = admin_id, proxy_id = proxy_id, "Deleting proxy");
    match state.proxies.delete(proxy_id).await {
        Ok(()) => {
            journal(state, ProxyAction::Deleted, proxy_id.trim(), None, admin_id).await;
            Reply::new(
                format!("🗑 Прокси {} удалён.", proxy_id.trim()),
                keyboards::back_keyboard(),
            )
        }
        Err(error) => {
            log_admin_error("Proxy deletion", &error);
            error_reply(&error)
        }
    }
}

pub fn build_qr_png_bytes(payload: &str) -> Result<Vec<u8>, anyhow::Error> {
    let qr = QrCode::new(payload.as_bytes())?;
    let image = qr
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .min_dimensions(512, 512)
        .build();
    let mut bytes = Vec::new();
    {
        let mut cursor = Cursor::new(&mut bytes);
        DynamicImage::ImageLuma8(image).write_to(&mut cursor, ImageFormat::Png)?;
    }
    Ok(bytes)
}

pub async fn send_proxy_qr(bot: &Bot, chat_id: ChatId, state: &BotState, proxy_id: &str) -> HandlerResult {
    let record = match state.proxies.find(proxy_id).await {
        Ok(record) => record,
        Err(error) => {
            log_admin_error("Proxy lookup", &error);
            return send_reply(bot, chat_id, error_reply(&error)).await;
        }
    };
    let settings = state.settings.get().await;
    let link = build_proxy_link(&settings, record.secret.as_deref(), record.port);
    let png = build_qr_png_bytes(&link)?;
    bot.send_photo(
        chat_id,
        InputFile::memory(png).file_name(format!("mtproxy-{}.png", record.id)),
    )
    .caption(format!("QR для прокси #{} ({})\n{}", record.id, record.name, link))
    .await?;
    Ok(())
}

pub fn parse_callback_page(data: &str, prefix: &str) -> Result<usize, anyhow::Error> {
    data.strip_prefix(prefix)
        .ok_or_else(|| anyhow!("Некорректный callback payload"))?
        .parse::<usize>()
        .map_err(|_| anyhow!("Некорректный номер страницы"))
}

pub fn parse_callback_value<'a>(data: &'a str, prefix: &str) -> Result<&'a str, anyhow::Error> {
    let value = data
        .strip_prefix(prefix)
        .ok_or_else(|| anyhow!("Некорректный callback payload"))?;
    if value.is_empty() {
        return Err(anyhow!("Пустое значение в callback payload"));
    }
    Ok(value)
}

pub fn callback_message_target(q: &CallbackQuery) -> Option<(ChatId, MessageId)> {
    q.message.as_ref().map(|msg| (msg.chat().id, msg.id()))
}

pub async fn require_admin_callback(
    bot: &Bot,
    q: &CallbackQuery,
    state: &BotState,
) -> Result<Option<i64>, anyhow::Error> {
    let admin_id = q.from.id.0 as i64;
    if !state.config.is_admin(admin_id) {
        tracing::warn!(user_id = admin_id, "Callback from non-admin user");
        bot.answer_callback_query(q.id.clone())
            .text("Недостаточно прав")
            .show_alert(true)
            .await?;
        return Ok(None);
    }
    Ok(Some(admin_id))
}

pub fn callback_prefix_filter(prefix: &'static str) -> impl Fn(CallbackQuery) -> Option<CallbackQuery> {
    move |q: CallbackQuery| {
        if q.data.as_deref().is_some_and(|payload| payload.starts_with(prefix)) {
            Some(q)
        } else {
            None
        }
    }
}

pub fn command_argument(text: &str) -> Option<&str> {
    text.split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim())
        .filter(|rest| !rest.is_empty())
}

#[cfg(test)]
mod tests {
    use super::super::state::testing::{state_with, ADMIN_ID};
    use super::*;
    use crate::scripts::fake::FakeScripts;
    use crate::scripts::{DELETE_PROXY, LIST_PROXIES, NEW_PROXY, STATS_PROXY};

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn callback_payloads() {
        assert_eq!(parse_callback_page("page:2", "page:").unwrap(), 2);
        assert!(parse_callback_page("page:-1", "page:").is_err());
        assert!(parse_callback_page("delete:1", "page:").is_err());
        assert_eq!(parse_callback_value("delete:abc", "delete:").unwrap(), "abc");
        assert!(parse_callback_value("delete:", "delete:").is_err());
    }

    #[test]
    fn command_argument_takes_rest() {
        assert_eq!(command_argument("/delete 3"), Some("3"));
        assert_eq!(command_argument("/new   auto "), Some("auto"));
        assert_eq!(command_argument("/delete"), None);
        assert_eq!(command_argument("/delete   "), None);
    }

    #[test]
    fn qr_png_is_generated() {
        let bytes = build_qr_png_bytes("https://t.me/proxy?server=x&port=443&secret=abc").unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[tokio::test]
    async fn list_reply_paginates_records() {
        let output: String = (1..=20).map(|n| format!("#{n} {SECRET} 443\n")).collect();
        let (state, _, _dir) = state_with(FakeScripts::default().respond(LIST_PROXIES, &output)).await;

        let reply = proxy_list_reply(&state, 2).await;
        assert!(reply.text.contains("Страница: 3/3"));
        assert!(reply.text.contains("#17 "));
        assert!(!reply.text.contains("#16 "));
    }

    #[tokio::test]
    async fn empty_list_reply() {
        let (state, _, _dir) = state_with(FakeScripts::default().respond(LIST_PROXIES, "NO_PROXIES")).await;
        let reply = proxy_list_reply(&state, 0).await;
        assert!(reply.text.starts_with("Прокси пока нет"));
    }

    #[tokio::test]
    async fn script_failure_becomes_error_reply() {
        let (state, _, _dir) = state_with(FakeScripts::default().fail(STATS_PROXY, "no service")).await;
        let reply = status_reply(&state).await;
        assert!(reply.text.contains("no service"));
        assert!(reply.text.contains("bash scripts/stats_proxy.sh"));
    }

    #[tokio::test]
    async fn create_and_delete_are_journaled() {
        let (state, _, _dir) = state_with(
            FakeScripts::default()
                .respond(NEW_PROXY, &format!("#9 {SECRET} 8443"))
                .respond(DELETE_PROXY, "DELETED"),
        )
        .await;

        let created = create_proxy_reply(&state, ADMIN_ID, PortChoice::Fixed(8443)).await;
        assert!(created.text.starts_with("✅ Прокси создан"));
        let deleted = delete_proxy_reply(&state, ADMIN_ID, "9").await;
        assert!(deleted.text.contains("удалён"));

        let events = state.db.recent_events(10).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, "deleted");
        assert_eq!(events[1].port, Some(8443));

        let history = history_reply(&state).await;
        assert!(history.text.contains("создано: 1, удалено: 1"));
    }

    #[tokio::test]
    async fn history_reports_journal_failure() {
        let (state, _, _dir) = state_with(FakeScripts::default()).await;
        state.db.close().await;
        let reply = history_reply(&state).await;
        assert!(reply.text.starts_with("⚠️ Не удалось прочитать журнал"));
        assert_eq!(callback_data(&reply.markup), vec!["menu:main".to_string()]);
    }

    fn callback_data(markup: &InlineKeyboardMarkup) -> Vec<String> {
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|button| match &button.kind {
                teloxide::types::InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn failed_delete_is_not_journaled() {
        let (state, _, _dir) = state_with(FakeScripts::default().respond(DELETE_PROXY, "NOT_FOUND")).await;
        let reply = delete_proxy_reply(&state, ADMIN_ID, "5").await;
        assert_eq!(reply.text, "Прокси 5 не найден.");
        assert!(state.db.recent_events(10).await.unwrap().is_empty());
    }
}
