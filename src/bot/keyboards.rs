//! Inline-клавиатуры бота: меню, настройки, страницы списка и удаления.

use crate::proxy::ProxyRecord;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

const LIST_COLUMNS: usize = 2;
const DELETE_COLUMNS: usize = 4;
const MAX_LABEL_CHARS: usize = 24;
/// Telegram отклоняет всё сообщение, если callback_data длиннее 64 байт.
pub const CALLBACK_DATA_LIMIT: usize = 64;

/// Срез записей для страницы `index` (с нуля).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub index: usize,
    pub total_pages: usize,
    pub start: usize,
    pub end: usize,
}

impl Page {
    /// Номер за пределами последней страницы прижимается к ней.
    pub fn new(total: usize, page_size: usize, requested: usize) -> Self {
        let page_size = page_size.max(1);
        let total_pages = total.div_ceil(page_size).max(1);
        let index = requested.min(total_pages - 1);
        let start = (index * page_size).min(total);
        let end = (start + page_size).min(total);
        Self {
            index,
            total_pages,
            start,
            end,
        }
    }

    pub fn has_prev(&self) -> bool {
        self.index > 0
    }

    pub fn has_next(&self) -> bool {
        self.index + 1 < self.total_pages
    }
}

pub fn main_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::default()
        .append_row(vec![
            InlineKeyboardButton::callback("📋 Список прокси", "menu:list"),
            InlineKeyboardButton::callback("➕ Новый прокси", "menu:new"),
        ])
        .append_row(vec![
            InlineKeyboardButton::callback("📊 Статус", "menu:status"),
            InlineKeyboardButton::callback("🗑 Удалить прокси", "menu:delete"),
        ])
        .append_row(vec![
            InlineKeyboardButton::callback("⚙️ Настройки", "menu:settings"),
            InlineKeyboardButton::callback("🕘 История", "menu:history"),
        ])
}

pub fn settings_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::default()
        .append_row(vec![
            InlineKeyboardButton::callback("🌐 IP сервера", "settings:ip"),
            InlineKeyboardButton::callback("🔤 DNS-имя", "settings:dns"),
        ])
        .append_row(vec![
            InlineKeyboardButton::callback("🔌 Порт по умолчанию", "settings:port"),
            back_button(),
        ])
}

pub fn new_proxy_port_buttons(default_port: u16) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::default()
        .append_row(vec![
            InlineKeyboardButton::callback(
                format!("По умолчанию ({})", default_port),
                "new:default",
            ),
            InlineKeyboardButton::callback("🎲 auto", "new:auto"),
        ])
        .append_row(vec![cancel_button()])
}

pub fn cancel_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::default().append_row(vec![cancel_button()])
}

pub fn back_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::default().append_row(vec![back_button()])
}

/// Кнопки под новым прокси: подключиться, QR, меню.
pub fn created_proxy_buttons(record: &ProxyRecord, link: &str) -> InlineKeyboardMarkup {
    let row: Vec<InlineKeyboardButton> = [
        link_button("🔗 Подключиться", link, record),
        checked_callback("📷 QR", format!("qr:{}", record.id)),
    ]
    .into_iter()
    .flatten()
    .collect();
    let markup = if row.is_empty() {
        InlineKeyboardMarkup::default()
    } else {
        InlineKeyboardMarkup::default().append_row(row)
    };
    markup.append_row(vec![back_button()])
}

/// Страница списка: каждая запись — URL-кнопка со ссылкой подключения.
pub fn proxy_list_keyboard<F>(records: &[ProxyRecord], page: Page, link_for: F) -> InlineKeyboardMarkup
where
    F: Fn(&ProxyRecord) -> String,
{
    let buttons: Vec<InlineKeyboardButton> = records[page.start..page.end]
        .iter()
        .filter_map(|record| link_button(&short_label(&record.name), &link_for(record), record))
        .collect();
    paged_keyboard(buttons, LIST_COLUMNS, page, "page:")
}

/// Страница удаления: каждая запись — кнопка `delete:<id>`.
pub fn delete_page_keyboard(records: &[ProxyRecord], page: Page) -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = records[page.start..page.end]
        .iter()
        .filter_map(|record| {
            checked_callback(
                format!("🗑 {}", short_label(&record.id)),
                format!("delete:{}", record.id),
            )
        })
        .collect();
    paged_keyboard(buttons, DELETE_COLUMNS, page, "delete_page:")
}

fn paged_keyboard(
    buttons: Vec<InlineKeyboardButton>,
    columns: usize,
    page: Page,
    page_prefix: &str,
) -> InlineKeyboardMarkup {
    let mut markup = InlineKeyboardMarkup::default();
    for row in buttons.chunks(columns) {
        markup = markup.append_row(row.to_vec());
    }

    let mut nav = Vec::new();
    if page.has_prev() {
        nav.push(InlineKeyboardButton::callback(
            "⬅️ Prev",
            format!("{}{}", page_prefix, page.index - 1),
        ));
    }
    if page.has_next() {
        nav.push(InlineKeyboardButton::callback(
            "Next ➡️",
            format!("{}{}", page_prefix, page.index + 1),
        ));
    }
    if !nav.is_empty() {
        markup = markup.append_row(nav);
    }
    markup.append_row(vec![back_button()])
}

fn link_button(text: &str, link: &str, record: &ProxyRecord) -> Option<InlineKeyboardButton> {
    match url::Url::parse(link) {
        Ok(url) => Some(InlineKeyboardButton::url(text.to_string(), url)),
        Err(error) => {
            tracing::warn!(link = link, error = %error, "Proxy link is not a valid URL");
            checked_callback(text.to_string(), format!("qr:{}", record.id))
        }
    }
}

/// Кнопка без payload, если он не влезает в лимит Telegram.
fn checked_callback(text: impl Into<String>, data: String) -> Option<InlineKeyboardButton> {
    if data.len() > CALLBACK_DATA_LIMIT {
        tracing::warn!(
            callback_data = %data,
            len = data.len(),
            "Callback data exceeds Telegram limit, button skipped"
        );
        return None;
    }
    Some(InlineKeyboardButton::callback(text.into(), data))
}

fn short_label(value: &str) -> String {
    if value.chars().count() > MAX_LABEL_CHARS {
        format!(
            "{}...",
            value.chars().take(MAX_LABEL_CHARS - 3).collect::<String>()
        )
    } else {
        value.to_string()
    }
}

fn back_button() -> InlineKeyboardButton {
    InlineKeyboardButton::callback("🔙 Меню", "menu:main")
}

fn cancel_button() -> InlineKeyboardButton {
    InlineKeyboardButton::callback("✖️ Отмена", "menu:cancel")
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    fn records(count: usize) -> Vec<ProxyRecord> {
        (1..=count)
            .map(|n| ProxyRecord {
                id: n.to_string(),
                name: format!("proxy_{n}"),
                secret: None,
                port: Some(443),
            })
            .collect()
    }

    fn callbacks(markup: &InlineKeyboardMarkup) -> Vec<String> {
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|button| match &button.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn page_bounds() {
        let first = Page::new(20, 8, 0);
        assert_eq!((first.start, first.end, first.total_pages), (0, 8, 3));
        assert!(!first.has_prev());
        assert!(first.has_next());

        let last = Page::new(20, 8, 2);
        assert_eq!((last.start, last.end), (16, 20));
        assert!(last.has_prev());
        assert!(!last.has_next());

        let clamped = Page::new(20, 8, 9);
        assert_eq!(clamped.index, 2);

        let empty = Page::new(0, 8, 0);
        assert_eq!((empty.total_pages, empty.start, empty.end), (1, 0, 0));
        assert!(!empty.has_prev() && !empty.has_next());
    }

    #[test]
    fn delete_pages_carry_ids_and_navigation() {
        let all = records(20);

        let first = callbacks(&delete_page_keyboard(&all, Page::new(20, 8, 0)));
        let expected_first: Vec<String> = (1..=8)
            .map(|n| format!("delete:{n}"))
            .chain(["delete_page:1".to_string(), "menu:main".to_string()])
            .collect();
        assert_eq!(first, expected_first);

        let last = callbacks(&delete_page_keyboard(&all, Page::new(20, 8, 2)));
        let expected_last: Vec<String> = (17..=20)
            .map(|n| format!("delete:{n}"))
            .chain(["delete_page:1".to_string(), "menu:main".to_string()])
            .collect();
        assert_eq!(last, expected_last);
    }

    #[test]
    fn delete_grid_has_four_columns() {
        let markup = delete_page_keyboard(&records(8), Page::new(8, 8, 0));
        assert_eq!(markup.inline_keyboard[0].len(), 4);
        assert_eq!(markup.inline_keyboard[1].len(), 4);
        assert_eq!(markup.inline_keyboard.len(), 3);
    }

    #[test]
    fn list_buttons_are_links() {
        let all = records(3);
        let markup = proxy_list_keyboard(&all, Page::new(3, 8, 0), |record| {
            format!("https://t.me/proxy?server=x&port=443&secret={}", record.id)
        });
        let urls: Vec<String> = markup
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|button| match &button.kind {
                InlineKeyboardButtonKind::Url(url) => Some(url.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(urls.len(), 3);
        assert!(urls[2].ends_with("secret=3"));
        assert_eq!(callbacks(&markup), vec!["menu:main".to_string()]);
    }

    #[test]
    fn oversized_ids_get_no_callback_buttons() {
        let mut all = records(3);
        all[1].id = "x".repeat(CALLBACK_DATA_LIMIT);

        let delete = callbacks(&delete_page_keyboard(&all, Page::new(3, 8, 0)));
        assert_eq!(delete, vec!["delete:1", "delete:3", "menu:main"]);
        assert!(delete.iter().all(|data| data.len() <= CALLBACK_DATA_LIMIT));

        let created = callbacks(&created_proxy_buttons(&all[1], "https://t.me/proxy?server=x"));
        assert_eq!(created, vec!["menu:main".to_string()]);
        let created = callbacks(&created_proxy_buttons(&all[0], "https://t.me/proxy?server=x"));
        assert_eq!(created, vec!["qr:1".to_string(), "menu:main".to_string()]);
    }

    #[test]
    fn long_labels_are_shortened() {
        let label = short_label(&"x".repeat(40));
        assert_eq!(label.chars().count(), MAX_LABEL_CHARS);
        assert!(label.ends_with("..."));
    }
}
