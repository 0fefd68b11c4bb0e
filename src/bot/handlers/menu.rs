use super::input::consume_pending_input;
use super::shared::{send_reply, HandlerResult};
use super::state::{sender_user_id, BotState};
use crate::bot::keyboards;
use teloxide::prelude::*;

/// Обычный текст: ответ на ожидаемый ввод либо подсказка с меню.
pub async fn handle_text(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(user_id) = sender_user_id(&msg) else {
        return Ok(());
    };
    if !state.config.is_admin(user_id) {
        tracing::debug!(user_id = user_id, "Ignoring message from non-admin user");
        return Ok(());
    }

    if text.starts_with('/') {
        bot.send_message(msg.chat.id, "Неизвестная команда. Список команд: /help")
            .reply_markup(keyboards::main_menu())
            .await?;
        return Ok(());
    }

    if let Some(reply) = consume_pending_input(&state, msg.chat.id.0, user_id, text).await {
        return send_reply(&bot, msg.chat.id, reply).await;
    }

    bot.send_message(msg.chat.id, "Не понял запрос. Используйте меню ниже.")
        .reply_markup(keyboards::main_menu())
        .await?;
    Ok(())
}
