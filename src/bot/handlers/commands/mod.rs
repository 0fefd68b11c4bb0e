use super::format::help_text;
use super::shared::{
    command_argument, create_proxy_reply, delete_page_reply, delete_proxy_reply, error_reply,
    history_reply, new_proxy_prompt, proxy_list_reply, send_reply, settings_reply, status_reply,
    HandlerResult, Reply,
};
use super::state::{is_admin_message, sender_user_id, BotState, SessionMode};
use crate::bot::keyboards;
use crate::service::PortChoice;
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum BotCommand {
    #[command(description = "Главное меню")]
    Start,
    #[command(description = "Справка")]
    Help,
    #[command(description = "Создать прокси: /new [порт|auto]")]
    New,
    #[command(description = "Список прокси")]
    List,
    #[command(description = "Статистика сервера")]
    Status,
    #[command(description = "Удалить прокси: /delete <id>")]
    Delete,
    #[command(description = "Настройки")]
    Settings,
    #[command(description = "Журнал действий")]
    History,
    #[command(description = "Отменить ввод")]
    Cancel,
}

pub fn handler() -> teloxide::dispatching::UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    teloxide::filter_command::<BotCommand, _>()
        .branch(dptree::case![BotCommand::Start].endpoint(cmd_start))
        .branch(dptree::case![BotCommand::Help].endpoint(cmd_help))
        .branch(dptree::case![BotCommand::New].endpoint(cmd_new))
        .branch(dptree::case![BotCommand::List].endpoint(cmd_list))
        .branch(dptree::case![BotCommand::Status].endpoint(cmd_status))
        .branch(dptree::case![BotCommand::Delete].endpoint(cmd_delete))
        .branch(dptree::case![BotCommand::Settings].endpoint(cmd_settings))
        .branch(dptree::case![BotCommand::History].endpoint(cmd_history))
        .branch(dptree::case![BotCommand::Cancel].endpoint(cmd_cancel))
}

async fn cmd_start(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    let user_id = sender_user_id(&msg);
    tracing::info!(user_id = ?user_id, chat_id = msg.chat.id.0, "Received /start command");

    if !is_admin_message(&msg, &state) {
        bot.send_message(msg.chat.id, "⛔️ У вас нет доступа к управлению этим прокси.")
            .await?;
        return Ok(());
    }

    bot.send_message(
        msg.chat.id,
        "Панель управления MTProxy. Выберите действие:",
    )
    .reply_markup(keyboards::main_menu())
    .await?;
    Ok(())
}

async fn cmd_help(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    if !is_admin_message(&msg, &state) {
        return Ok(());
    }
    bot.send_message(msg.chat.id, help_text())
        .reply_markup(keyboards::main_menu())
        .await?;
    Ok(())
}

async fn cmd_new(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    let Some(admin_id) = admin_sender(&msg, &state) else {
        return Ok(());
    };
    let text = msg.text().unwrap_or("");
    tracing::info!(admin_id = admin_id, "Admin command /new");

    let reply = match command_argument(text) {
        Some(arg) => match PortChoice::parse(arg) {
            Ok(choice) => create_proxy_reply(&state, admin_id, choice).await,
            Err(error) => error_reply(&error),
        },
        None => {
            state
                .sessions
                .set(msg.chat.id.0, SessionMode::NewProxyPort)
                .await;
            new_proxy_prompt(&state).await
        }
    };
    send_reply(&bot, msg.chat.id, reply).await
}

async fn cmd_list(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    let Some(admin_id) = admin_sender(&msg, &state) else {
        return Ok(());
    };
    tracing::info!(admin_id = admin_id, "Admin command /list");
    send_reply(&bot, msg.chat.id, proxy_list_reply(&state, 0).await).await
}

async fn cmd_status(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    let Some(admin_id) = admin_sender(&msg, &state) else {
        return Ok(());
    };
    tracing::info!(admin_id = admin_id, "Admin command /status");
    send_reply(&bot, msg.chat.id, status_reply(&state).await).await
}

async fn cmd_delete(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    let Some(admin_id) = admin_sender(&msg, &state) else {
        return Ok(());
    };
    let text = msg.text().unwrap_or("");
    tracing::info!(admin_id = admin_id, "Admin command /delete");

    let reply = match command_argument(text) {
        Some(proxy_id) => delete_proxy_reply(&state, admin_id, proxy_id).await,
        None => {
            state
                .sessions
                .set(msg.chat.id.0, SessionMode::AwaitDeleteId)
                .await;
            delete_page_reply(&state, 0).await
        }
    };
    send_reply(&bot, msg.chat.id, reply).await
}

async fn cmd_settings(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    if admin_sender(&msg, &state).is_none() {
        return Ok(());
    }
    send_reply(&bot, msg.chat.id, settings_reply(&state).await).await
}

async fn cmd_history(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    if admin_sender(&msg, &state).is_none() {
        return Ok(());
    }
    send_reply(&bot, msg.chat.id, history_reply(&state).await).await
}

async fn cmd_cancel(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    if admin_sender(&msg, &state).is_none() {
        return Ok(());
    }
    send_reply(&bot, msg.chat.id, cancel_reply(&state, msg.chat.id.0).await).await
}

pub async fn cancel_reply(state: &BotState, chat_id: i64) -> Reply {
    let text = match state.sessions.clear(chat_id).await {
        Some(mode) => {
            tracing::info!(chat_id = chat_id, mode = ?mode, "Text input cancelled");
            "Ввод отменён."
        }
        None => "Нечего отменять.",
    };
    Reply::new(text, keyboards::main_menu())
}

fn admin_sender(msg: &Message, state: &BotState) -> Option<i64> {
    sender_user_id(msg).filter(|user_id| state.config.is_admin(*user_id))
}
