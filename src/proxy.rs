//! Разбор вывода скриптов: список прокси, результат удаления, статистика.
//!
//! Строка списка — токены через пробел в произвольном порядке:
//! `key=value` (id, name, secret, port) задают поле явно (`secret=` с любым
//! hex-значением, иначе токен отбрасывается), ведущий `#<id>`
//! задаёт идентификатор, токены со `://` считаются ссылками и
//! отбрасываются. Из оставшихся первый 32-символьный hex-токен — секрет,
//! первый числовой токен из 1–5 цифр в диапазоне 1..=65535 — порт,
//! остальное — имя. Без явного id используется позиция строки (с 1).

pub const NO_PROXIES: &str = "NO_PROXIES";
pub const PLACEHOLDER: &str = "?";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRecord {
    pub id: String,
    pub name: String,
    pub secret: Option<String>,
    pub port: Option<u16>,
}

impl ProxyRecord {
    pub fn port_label(&self) -> String {
        self.port
            .map(|port| port.to_string())
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    }

    pub fn secret_label(&self) -> &str {
        self.secret.as_deref().unwrap_or(PLACEHOLDER)
    }
}

pub fn parse_proxy_list(output: &str) -> Vec<ProxyRecord> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.eq_ignore_ascii_case(NO_PROXIES))
        .enumerate()
        .filter_map(|(index, line)| parse_proxy_line(line, index + 1))
        .collect()
}

pub fn parse_proxy_line(line: &str, position: usize) -> Option<ProxyRecord> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    let mut id: Option<String> = None;
    let mut name: Option<String> = None;
    let mut secret: Option<String> = None;
    let mut port: Option<u16> = None;
    let mut rest: Vec<&str> = Vec::new();

    for (index, token) in tokens.iter().copied().enumerate() {
        if let Some((key, value)) = token.split_once('=') {
            let value = value.trim();
            match key.to_ascii_lowercase().as_str() {
                "id" if !value.is_empty() => {
                    id = Some(value.to_string());
                    continue;
                }
                "name" if !value.is_empty() => {
                    name = Some(value.to_string());
                    continue;
                }
                "secret" => {
                    if is_hex(value) {
                        secret = Some(value.to_ascii_lowercase());
                    }
                    continue;
                }
                "port" => {
                    port = parse_port(value);
                    continue;
                }
                _ => {}
            }
        }
        if index == 0
            && let Some(tagged) = token.strip_prefix('#')
            && !tagged.is_empty()
        {
            id = Some(tagged.to_string());
            continue;
        }
        if token.contains("://") {
            continue;
        }
        rest.push(token);
    }

    let mut leftovers: Vec<&str> = Vec::with_capacity(rest.len());
    for token in rest {
        if secret.is_none() && is_secret(token) {
            secret = Some(token.to_ascii_lowercase());
        } else if port.is_none()
            && let Some(value) = parse_port(token)
        {
            port = Some(value);
        } else {
            leftovers.push(token);
        }
    }

    let name = name.unwrap_or_else(|| {
        if leftovers.is_empty() {
            format!("proxy_{}", position)
        } else {
            leftovers.join(" ")
        }
    });

    Some(ProxyRecord {
        id: id.unwrap_or_else(|| position.to_string()),
        name,
        secret,
        port,
    })
}

fn is_secret(token: &str) -> bool {
    token.len() == 32 && is_hex(token)
}

/// Явный `secret=` может нести префикс dd/ee и домен, поэтому длина любая.
fn is_hex(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_hexdigit())
}

fn parse_port(token: &str) -> Option<u16> {
    if token.is_empty() || token.len() > 5 || !token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    token.parse::<u32>().ok().and_then(|value| {
        if (1..=65535).contains(&value) {
            Some(value as u16)
        } else {
            None
        }
    })
}

/// Итог `delete_proxy.sh`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    Unrecognized(String),
}

pub fn parse_delete_outcome(output: &str) -> DeleteOutcome {
    let trimmed = output.trim();
    if trimmed.starts_with("DELETED") {
        DeleteOutcome::Deleted
    } else if trimmed.starts_with("NOT_FOUND") {
        DeleteOutcome::NotFound
    } else {
        DeleteOutcome::Unrecognized(trimmed.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyStats {
    pub proxy_count: Option<String>,
    pub by_port: Option<String>,
    pub service: Option<String>,
    pub listening_ports: Option<String>,
    pub other: Vec<String>,
}

impl ProxyStats {
    pub fn is_empty(&self) -> bool {
        self.proxy_count.is_none()
            && self.by_port.is_none()
            && self.service.is_none()
            && self.listening_ports.is_none()
            && self.other.is_empty()
    }
}

pub fn parse_stats(output: &str) -> ProxyStats {
    let mut stats = ProxyStats::default();
    for line in output.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let known = line.split_once('=').and_then(|(key, value)| {
            let value = value.trim().to_string();
            match key.trim() {
                "PROXY_COUNT" => Some(&mut stats.proxy_count),
                "BY_PORT" => Some(&mut stats.by_port),
                "MTPROXY_SERVICE" => Some(&mut stats.service),
                "LISTENING_PORTS" => Some(&mut stats.listening_ports),
                _ => None,
            }
            .map(|slot| *slot = Some(value))
        });
        if known.is_none() {
            stats.other.push(line.to_string());
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn record(id: &str, name: &str, secret: Option<&str>, port: Option<u16>) -> ProxyRecord {
        ProxyRecord {
            id: id.to_string(),
            name: name.to_string(),
            secret: secret.map(str::to_string),
            port,
        }
    }

    #[test]
    fn empty_outputs_yield_no_records() {
        for output in ["", "NO_PROXIES", "  no_proxies  \n", "\n\n   \n", "\nNo_Proxies\n\n"] {
            assert!(parse_proxy_list(output).is_empty(), "output: {output:?}");
        }
    }

    #[test]
    fn line_heuristics() {
        let cases: Vec<(String, ProxyRecord)> = vec![
            (
                format!("{SECRET} 443"),
                record("1", "proxy_1", Some(SECRET), Some(443)),
            ),
            (
                format!("8443 {SECRET}"),
                record("1", "proxy_1", Some(SECRET), Some(8443)),
            ),
            (
                format!("office {SECRET} 443"),
                record("1", "office", Some(SECRET), Some(443)),
            ),
            (
                format!("#7 home wifi 443 {SECRET} https://t.me/proxy?server=x&port=443"),
                record("7", "home wifi", Some(SECRET), Some(443)),
            ),
            (
                format!("id=abc port=2053 secret={SECRET} name=berlin"),
                record("abc", "berlin", Some(SECRET), Some(2053)),
            ),
            (
                format!("id=1 secret=dd{SECRET} port=443"),
                record("1", "proxy_1", Some(format!("dd{SECRET}").as_str()), Some(443)),
            ),
            (
                "id=2 secret=not-hex office".to_string(),
                record("2", "office", None, None),
            ),
            (
                "just-a-name".to_string(),
                record("1", "just-a-name", None, None),
            ),
            (
                format!("big 99999 {}", SECRET.to_uppercase()),
                record("1", "big 99999", Some(SECRET), None),
            ),
            (
                "short deadbeef 0".to_string(),
                record("1", "short deadbeef 0", None, None),
            ),
        ];

        for (line, expected) in cases {
            assert_eq!(parse_proxy_line(&line, 1), Some(expected), "line: {line}");
        }
    }

    #[test]
    fn positional_ids_skip_blank_and_sentinel_lines() {
        let output = format!("\n{SECRET} 443\n\nsecond 8443\n");
        let records = parse_proxy_list(&output);
        assert_eq!(
            records,
            vec![
                record("1", "proxy_1", Some(SECRET), Some(443)),
                record("2", "second", None, Some(8443)),
            ]
        );
    }

    #[test]
    fn first_matching_tokens_win() {
        let other = "ffffffffffffffffffffffffffffffff";
        let parsed = parse_proxy_line(&format!("{SECRET} {other} 443 80"), 3).unwrap();
        assert_eq!(parsed.secret.as_deref(), Some(SECRET));
        assert_eq!(parsed.port, Some(443));
        assert_eq!(parsed.name, format!("{other} 80"));
        assert_eq!(parsed.id, "3");
    }

    #[test]
    fn labels_use_placeholder() {
        let parsed = record("1", "x", None, None);
        assert_eq!(parsed.port_label(), "?");
        assert_eq!(parsed.secret_label(), "?");
    }

    #[test]
    fn delete_outcomes() {
        assert_eq!(parse_delete_outcome("DELETED 3\n"), DeleteOutcome::Deleted);
        assert_eq!(parse_delete_outcome("  NOT_FOUND"), DeleteOutcome::NotFound);
        assert_eq!(
            parse_delete_outcome("permission denied"),
            DeleteOutcome::Unrecognized("permission denied".to_string())
        );
    }

    #[test]
    fn stats_recognizes_known_keys() {
        let stats = parse_stats(
            "PROXY_COUNT=3\nBY_PORT=443:2 8443:1\nMTPROXY_SERVICE=active\n\
             LISTENING_PORTS=443,8443\nuptime 3 days\n",
        );
        assert_eq!(stats.proxy_count.as_deref(), Some("3"));
        assert_eq!(stats.by_port.as_deref(), Some("443:2 8443:1"));
        assert_eq!(stats.service.as_deref(), Some("active"));
        assert_eq!(stats.listening_ports.as_deref(), Some("443,8443"));
        assert_eq!(stats.other, vec!["uptime 3 days".to_string()]);
        assert!(parse_stats("\n").is_empty());
    }
}
