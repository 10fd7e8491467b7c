pub mod http;
pub mod loader;
pub mod socks5;

use std::{fmt, sync::Arc};

use serde_yaml::Value;

use crate::{
    error::{BenchError, Result},
    models::RawConfig,
};

use self::{http::HttpDialer, socks5::Socks5Dialer};

/// Routes traffic through one endpoint.
///
/// The engine never opens sockets itself: the HTTP client it builds for an
/// endpoint dials every target host through the proxy returned here.
pub trait Dialer: Send + Sync {
    /// Human readable protocol label, e.g. `Socks5`.
    fn protocol(&self) -> &str;

    fn proxy(&self) -> Result<reqwest::Proxy>;
}

impl fmt::Debug for dyn Dialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dialer({})", self.protocol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyType {
    Shadowsocks,
    ShadowsocksR,
    Snell,
    Socks5,
    Http,
    Vmess,
    Vless,
    Trojan,
    Hysteria,
    Hysteria2,
    WireGuard,
    Tuic,
    Ssh,
    AnyTls,
}

impl ProxyType {
    pub fn parse(value: &str) -> Option<ProxyType> {
        let proxy_type = match value.to_ascii_lowercase().as_str() {
            "ss" => ProxyType::Shadowsocks,
            "ssr" => ProxyType::ShadowsocksR,
            "snell" => ProxyType::Snell,
            "socks5" => ProxyType::Socks5,
            "http" => ProxyType::Http,
            "vmess" => ProxyType::Vmess,
            "vless" => ProxyType::Vless,
            "trojan" => ProxyType::Trojan,
            "hysteria" => ProxyType::Hysteria,
            "hysteria2" => ProxyType::Hysteria2,
            "wireguard" => ProxyType::WireGuard,
            "tuic" => ProxyType::Tuic,
            "ssh" => ProxyType::Ssh,
            "anytls" => ProxyType::AnyTls,
            _ => return None,
        };
        Some(proxy_type)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyType::Shadowsocks => "Shadowsocks",
            ProxyType::ShadowsocksR => "ShadowsocksR",
            ProxyType::Snell => "Snell",
            ProxyType::Socks5 => "Socks5",
            ProxyType::Http => "Http",
            ProxyType::Vmess => "Vmess",
            ProxyType::Vless => "Vless",
            ProxyType::Trojan => "Trojan",
            ProxyType::Hysteria => "Hysteria",
            ProxyType::Hysteria2 => "Hysteria2",
            ProxyType::WireGuard => "WireGuard",
            ProxyType::Tuic => "Tuic",
            ProxyType::Ssh => "Ssh",
            ProxyType::AnyTls => "AnyTLS",
        }
    }
}

/// What the dial layer can do with one proxy definition.
pub enum Dial {
    Ready(Arc<dyn Dialer>),
    /// A known proxy type without a dialer in this build.
    Unsupported(ProxyType),
    Unknown(String),
}

pub fn dialer_for(raw: &RawConfig) -> Result<Dial> {
    let Some(kind) = field_str(raw, "type") else {
        return Ok(Dial::Unknown(String::new()));
    };

    let dial = match ProxyType::parse(kind) {
        Some(ProxyType::Socks5) => {
            Dial::Ready(Arc::new(Socks5Dialer::from_config(raw)?))
        }
        Some(ProxyType::Http) => {
            Dial::Ready(Arc::new(HttpDialer::from_config(raw)?))
        }
        Some(other) => Dial::Unsupported(other),
        None => Dial::Unknown(kind.to_string()),
    };
    Ok(dial)
}

pub(crate) fn field_str<'a>(
    raw: &'a RawConfig,
    key: &str,
) -> Option<&'a str> {
    raw.get(key).and_then(Value::as_str)
}

pub(crate) fn field_bool(raw: &RawConfig, key: &str) -> bool {
    raw.get(key).and_then(Value::as_bool).unwrap_or(false)
}

pub(crate) fn field_port(raw: &RawConfig) -> Result<u16> {
    let port = match raw.get("port") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.parse::<u64>().ok(),
        _ => None,
    };

    port.and_then(|p| u16::try_from(p).ok())
        .ok_or_else(|| BenchError::ParseError("invalid or missing port".into()))
}

pub(crate) fn field_server(raw: &RawConfig) -> Result<String> {
    field_str(raw, "server")
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| BenchError::ParseError("missing server".into()))
}

/// `host:port`, bracketing IPv6 literals.
pub(crate) fn authority(server: &str, port: u16) -> String {
    if server.contains(':') && !server.starts_with('[') {
        format!("[{}]:{}", server, port)
    } else {
        format!("{}:{}", server, port)
    }
}
