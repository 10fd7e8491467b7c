use crate::{
    error::{BenchError, Result},
    models::RawConfig,
};

use super::{authority, field_port, field_server, field_str, Dialer};

/// SOCKS5 upstream, resolved remotely (`socks5h`) so that DNS leaks through
/// the proxy exactly like the traffic does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socks5Dialer {
    server: String,
    port: u16,
    username: Option<String>,
    password: Option<String>,
}

impl Socks5Dialer {
    pub fn new(server: impl Into<String>, port: u16) -> Self {
        Self {
            server: server.into(),
            port,
            username: None,
            password: None,
        }
    }

    pub fn with_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn from_config(raw: &RawConfig) -> Result<Self> {
        let mut dialer = Self::new(field_server(raw)?, field_port(raw)?);
        if let Some(username) = field_str(raw, "username") {
            dialer = dialer.with_auth(
                username,
                field_str(raw, "password").unwrap_or_default(),
            );
        }
        Ok(dialer)
    }

    fn url(&self) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&format!(
            "socks5h://{}",
            authority(&self.server, self.port)
        ))
        .map_err(|e| BenchError::ParseError(e.to_string()))?;

        if let Some(username) = &self.username {
            url.set_username(username).map_err(|_| {
                BenchError::ParseError("invalid socks5 username".into())
            })?;
            url.set_password(self.password.as_deref()).map_err(|_| {
                BenchError::ParseError("invalid socks5 password".into())
            })?;
        }
        Ok(url)
    }
}

impl Dialer for Socks5Dialer {
    fn protocol(&self) -> &str {
        "Socks5"
    }

    fn proxy(&self) -> Result<reqwest::Proxy> {
        Ok(reqwest::Proxy::all(self.url()?)?)
    }
}
