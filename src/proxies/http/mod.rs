use crate::{error::Result, models::RawConfig};

use super::{authority, field_bool, field_port, field_server, field_str, Dialer};

/// HTTP(S) forward proxy. Plain-HTTP targets are sent in absolute form,
/// HTTPS targets are tunnelled with `CONNECT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpDialer {
    server: String,
    port: u16,
    tls: bool,
    username: Option<String>,
    password: Option<String>,
}

impl HttpDialer {
    pub fn new(server: impl Into<String>, port: u16) -> Self {
        HttpDialer {
            server: server.into(),
            port,
            tls: false,
            username: None,
            password: None,
        }
    }

    pub fn from_config(raw: &RawConfig) -> Result<Self> {
        let mut dialer = Self::new(field_server(raw)?, field_port(raw)?);
        dialer.tls = field_bool(raw, "tls");
        dialer.username = field_str(raw, "username").map(str::to_string);
        dialer.password = field_str(raw, "password").map(str::to_string);
        Ok(dialer)
    }

    fn url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{}://{}", scheme, authority(&self.server, self.port))
    }
}

impl Dialer for HttpDialer {
    fn protocol(&self) -> &str {
        "Http"
    }

    fn proxy(&self) -> Result<reqwest::Proxy> {
        let mut proxy = reqwest::Proxy::all(self.url())?;
        if let Some(username) = &self.username {
            proxy = proxy.basic_auth(
                username,
                self.password.as_deref().unwrap_or_default(),
            );
        }
        Ok(proxy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_flag_selects_https_scheme() {
        let raw: RawConfig = serde_yaml::from_str(
            "{type: http, server: example.com, port: 443, tls: true, username: u, password: p}",
        )
        .unwrap();
        let dialer = HttpDialer::from_config(&raw).unwrap();

        assert_eq!(dialer.url(), "https://example.com:443");
        assert!(dialer.proxy().is_ok());
    }

    #[test]
    fn missing_server_is_rejected() {
        let raw: RawConfig = serde_yaml::from_str("{type: http, port: 80}").unwrap();
        assert!(HttpDialer::from_config(&raw).is_err());
    }
}
