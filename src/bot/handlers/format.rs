use crate::db::{JournalStats, ProxyEvent};
use crate::proxy::{ProxyRecord, ProxyStats};
use crate::service::AdminError;
use crate::settings::Settings;
use chrono::{DateTime, Local, Utc};

pub fn format_timestamp(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| {
            dt.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S %:z")
                .to_string()
        })
        .unwrap_or_else(|| format!("Некорректный timestamp: {}", ts))
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() { "—" } else { value }
}

pub fn render_proxy_line(record: &ProxyRecord, link: &str) -> String {
    format!(
        "#{} {} | порт {}\n{}",
        record.id,
        record.name,
        record.port_label(),
        link
    )
}

pub fn render_list_text<F>(records: &[ProxyRecord], start: usize, end: usize, page: (usize, usize), link_for: F) -> String
where
    F: Fn(&ProxyRecord) -> String,
{
    if records.is_empty() {
        return "Прокси пока нет. Создайте первый через «➕ Новый прокси».".to_string();
    }
    let lines: Vec<String> = records[start..end]
        .iter()
        .map(|record| render_proxy_line(record, &link_for(record)))
        .collect();
    format!(
        "📋 Прокси: {}\nСтраница: {}/{}\n\n{}",
        records.len(),
        page.0 + 1,
        page.1,
        lines.join("\n\n")
    )
}

pub fn render_delete_text(total: usize, page: (usize, usize)) -> String {
    if total == 0 {
        return "Удалять нечего: прокси нет.".to_string();
    }
    format!(
        "🗑 Удаление прокси\nВсего: {}\nСтраница: {}/{}\n\nНажмите на кнопку с ID или отправьте ID текстом.",
        total,
        page.0 + 1,
        page.1
    )
}

pub fn render_created_text(record: &ProxyRecord, link: &str) -> String {
    format!(
        "✅ Прокси создан\n\n\
         ID: {}\n\
         Имя: {}\n\
         Порт: {}\n\
         Секрет: {}\n\n\
         Ссылка:\n{}",
        record.id,
        record.name,
        record.port_label(),
        record.secret_label(),
        link
    )
}

pub fn render_stats_text(stats: &ProxyStats, raw: &str) -> String {
    if stats.is_empty() {
        return "📊 Статус\n\nСкрипт не вернул данных.".to_string();
    }
    let mut out = String::from("📊 Статус\n");
    let known = [
        ("Прокси", &stats.proxy_count),
        ("По портам", &stats.by_port),
        ("Сервис MTProxy", &stats.service),
        ("Слушает порты", &stats.listening_ports),
    ];
    let mut any_known = false;
    for (label, value) in known {
        if let Some(value) = value {
            out.push_str(&format!("\n{}: {}", label, value));
            any_known = true;
        }
    }
    if !stats.other.is_empty() {
        if any_known {
            out.push('\n');
        }
        for line in &stats.other {
            out.push('\n');
            out.push_str(line);
        }
    } else if !any_known {
        out.push('\n');
        out.push_str(raw.trim());
    }
    out
}

pub fn render_settings_text(settings: &Settings) -> String {
    format!(
        "⚙️ Настройки\n\n\
         IP сервера: {}\n\
         DNS-имя: {}\n\
         Порт по умолчанию: {}",
        or_dash(&settings.public_host),
        or_dash(&settings.dns_name),
        settings.default_port
    )
}

pub fn render_history_text(events: &[ProxyEvent], stats: &JournalStats) -> String {
    if events.is_empty() {
        return "🕘 История пуста.".to_string();
    }
    let lines: Vec<String> = events
        .iter()
        .map(|event| {
            let action = match event.action.as_str() {
                "created" => "➕ создан",
                "deleted" => "🗑 удалён",
                other => other,
            };
            let port = event
                .port
                .map(|port| format!(" (порт {})", port))
                .unwrap_or_default();
            format!(
                "• {} #{}{} — admin {} — {}",
                action,
                event.proxy_id,
                port,
                event.admin_id,
                format_timestamp(event.created_at)
            )
        })
        .collect();
    format!(
        "🕘 История (создано: {}, удалено: {})\n\n{}",
        stats.created,
        stats.deleted,
        lines.join("\n")
    )
}

pub fn render_admin_error(error: &AdminError) -> String {
    match error {
        AdminError::Validation(message) => message.clone(),
        AdminError::NotFound(id) => format!("Прокси {} не найден.", id),
        AdminError::Script { .. } | AdminError::UnexpectedOutput { .. } => {
            let mut out = format!("⚠️ Ошибка выполнения скрипта:\n{}", error);
            if let Some(manual) = error.manual_command() {
                out.push_str(&format!("\n\nПопробуйте вручную на сервере:\n{}", manual));
            }
            out
        }
    }
}

pub fn help_text() -> &'static str {
    r#"Команды:
/start — главное меню
/new [порт|auto] — создать прокси
/list — список прокси
/status — статистика сервера
/delete <id> — удалить прокси
/settings — IP, DNS-имя и порт по умолчанию
/history — журнал действий
/cancel — отменить ввод"#
}
