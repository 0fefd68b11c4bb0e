//! Ссылки подключения к MTProxy.

use crate::settings::Settings;

pub const LINK_BASE: &str = "https://t.me/proxy";
pub const HOST_PLACEHOLDER: &str = "YOUR_SERVER_IP";

/// Без секрета или порта ссылка содержит только `server`.
pub fn build_proxy_link(settings: &Settings, secret: Option<&str>, port: Option<u16>) -> String {
    let host = settings.server_host().unwrap_or(HOST_PLACEHOLDER);
    let secret = secret.map(str::trim).filter(|value| !value.is_empty());
    match (secret, port) {
        (Some(secret), Some(port)) => format!(
            "{}?server={}&port={}&secret={}",
            LINK_BASE,
            urlencoding::encode(host),
            port,
            urlencoding::encode(secret)
        ),
        _ => format!("{}?server={}", LINK_BASE, urlencoding::encode(host)),
    }
}
