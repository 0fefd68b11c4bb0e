use super::commands::cancel_reply;
use super::format::help_text;
use super::input::begin_input;
use super::shared::{
    callback_message_target, callback_prefix_filter, create_proxy_reply, delete_page_reply,
    delete_proxy_reply, history_reply, new_proxy_prompt, parse_callback_page,
    parse_callback_value, proxy_list_reply, require_admin_callback, send_proxy_qr, settings_reply,
    show_reply, status_reply, HandlerResult, Reply,
};
use super::state::{BotState, SessionMode};
use crate::bot::keyboards;
use crate::service::PortChoice;
use teloxide::dptree;
use teloxide::prelude::*;

const CALLBACK_NOTICE_LIMIT: usize = 190;

pub fn handler() -> teloxide::dispatching::UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    Update::filter_callback_query()
        .branch(dptree::filter_map(callback_prefix_filter("menu:")).endpoint(callback_menu))
        .branch(dptree::filter_map(callback_prefix_filter("settings:")).endpoint(callback_settings))
        .branch(dptree::filter_map(callback_prefix_filter("new:")).endpoint(callback_new))
        .branch(dptree::filter_map(callback_prefix_filter("page:")).endpoint(callback_list_page))
        .branch(
            dptree::filter_map(callback_prefix_filter("delete_page:")).endpoint(callback_delete_page),
        )
        .branch(dptree::filter_map(callback_prefix_filter("delete:")).endpoint(callback_delete))
        .branch(dptree::filter_map(callback_prefix_filter("qr:")).endpoint(callback_qr))
}

async fn callback_menu(bot: Bot, q: CallbackQuery, state: BotState) -> HandlerResult {
    let Some(admin_id) = require_admin_callback(&bot, &q, &state).await? else {
        return Ok(());
    };
    let Some((chat_id, message_id)) = callback_message_target(&q) else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    let data = q.data.as_deref().unwrap_or("");
    let action = data.strip_prefix("menu:").unwrap_or("main");
    tracing::info!(admin_id = admin_id, action = action, "Menu callback received");
    bot.answer_callback_query(q.id.clone()).await?;

    let reply = menu_reply(&state, chat_id.0, action).await;
    show_reply(&bot, chat_id, Some(message_id), reply).await
}

/// Переход по меню сбрасывает ожидаемый ввод, кроме экранов, которые его задают.
async fn menu_reply(state: &BotState, chat_id: i64, action: &str) -> Reply {
    if !matches!(action, "new" | "delete" | "cancel")
        && let Some(mode) = state.sessions.clear(chat_id).await
    {
        tracing::info!(chat_id = chat_id, mode = ?mode, "Pending input dropped by menu navigation");
    }

    match action {
        "list" => proxy_list_reply(state, 0).await,
        "new" => {
            state.sessions.set(chat_id, SessionMode::NewProxyPort).await;
            new_proxy_prompt(state).await
        }
        "status" => status_reply(state).await,
        "delete" => {
            state.sessions.set(chat_id, SessionMode::AwaitDeleteId).await;
            delete_page_reply(state, 0).await
        }
        "settings" => settings_reply(state).await,
        "history" => history_reply(state).await,
        "cancel" => cancel_reply(state, chat_id).await,
        "help" => Reply::new(help_text(), keyboards::main_menu()),
        _ => Reply::new("Главное меню:", keyboards::main_menu()),
    }
}

async fn callback_settings(bot: Bot, q: CallbackQuery, state: BotState) -> HandlerResult {
    if require_admin_callback(&bot, &q, &state).await?.is_none() {
        return Ok(());
    }
    let data = q.data.as_deref().unwrap_or("");
    let mode = match data.strip_prefix("settings:") {
        Some("ip") => SessionMode::SetIp,
        Some("dns") => SessionMode::SetDns,
        Some("port") => SessionMode::SetPort,
        _ => {
            bot.answer_callback_query(q.id.clone())
                .text("Неизвестная настройка")
                .await?;
            return Ok(());
        }
    };
    bot.answer_callback_query(q.id.clone()).await?;

    if let Some((chat_id, message_id)) = callback_message_target(&q) {
        let reply = begin_input(&state, chat_id.0, mode).await;
        show_reply(&bot, chat_id, Some(message_id), reply).await?;
    }
    Ok(())
}

async fn callback_new(bot: Bot, q: CallbackQuery, state: BotState) -> HandlerResult {
    let Some(admin_id) = require_admin_callback(&bot, &q, &state).await? else {
        return Ok(());
    };
    let data = q.data.as_deref().unwrap_or("");
    let choice = match data.strip_prefix("new:") {
        Some("auto") => PortChoice::Auto,
        _ => PortChoice::Default,
    };
    bot.answer_callback_query(q.id.clone())
        .text("Создаю прокси…")
        .await?;

    if let Some((chat_id, message_id)) = callback_message_target(&q) {
        state.sessions.clear(chat_id.0).await;
        let reply = create_proxy_reply(&state, admin_id, choice).await;
        show_reply(&bot, chat_id, Some(message_id), reply).await?;
    }
    Ok(())
}

async fn callback_list_page(bot: Bot, q: CallbackQuery, state: BotState) -> HandlerResult {
    if require_admin_callback(&bot, &q, &state).await?.is_none() {
        return Ok(());
    }
    let data = q.data.as_deref().unwrap_or("");
    let page = parse_callback_page(data, "page:")?;
    bot.answer_callback_query(q.id.clone()).await?;

    if let Some((chat_id, message_id)) = callback_message_target(&q) {
        let reply = proxy_list_reply(&state, page).await;
        show_reply(&bot, chat_id, Some(message_id), reply).await?;
    }
    Ok(())
}

async fn callback_delete_page(bot: Bot, q: CallbackQuery, state: BotState) -> HandlerResult {
    if require_admin_callback(&bot, &q, &state).await?.is_none() {
        return Ok(());
    }
    let data = q.data.as_deref().unwrap_or("");
    let page = parse_callback_page(data, "delete_page:")?;
    bot.answer_callback_query(q.id.clone()).await?;

    if let Some((chat_id, message_id)) = callback_message_target(&q) {
        let reply = delete_page_reply(&state, page).await;
        show_reply(&bot, chat_id, Some(message_id), reply).await?;
    }
    Ok(())
}

async fn callback_delete(bot: Bot, q: CallbackQuery, state: BotState) -> HandlerResult {
    let Some(admin_id) = require_admin_callback(&bot, &q, &state).await? else {
        return Ok(());
    };
    let data = q.data.as_deref().unwrap_or("");
    let proxy_id = parse_callback_value(data, "delete:")?;
    tracing::info!(admin_id = admin_id, proxy_id = proxy_id, "Delete callback received");

    let reply = delete_proxy_reply(&state, admin_id, proxy_id).await;
    let notice: String = reply
        .text
        .lines()
        .next()
        .unwrap_or("")
        .chars()
        .take(CALLBACK_NOTICE_LIMIT)
        .collect();
    bot.answer_callback_query(q.id.clone()).text(notice).await?;

    if let Some((chat_id, message_id)) = callback_message_target(&q) {
        state.sessions.clear(chat_id.0).await;
        bot.send_message(chat_id, reply.text).await?;
        show_reply(&bot, chat_id, Some(message_id), delete_page_reply(&state, 0).await).await?;
    }
    Ok(())
}

async fn callback_qr(bot: Bot, q: CallbackQuery, state: BotState) -> HandlerResult {
    if require_admin_callback(&bot, &q, &state).await?.is_none() {
        return Ok(());
    }
    let data = q.data.as_deref().unwrap_or("");
    let proxy_id = parse_callback_value(data, "qr:")?;
    bot.answer_callback_query(q.id.clone())
        .text("Отправляю QR")
        .await?;

    if let Some((chat_id, _)) = callback_message_target(&q) {
        send_proxy_qr(&bot, chat_id, &state, proxy_id).await?;
    }
    Ok(())
}
