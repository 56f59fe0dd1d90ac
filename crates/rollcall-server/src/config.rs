//! Server configuration from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use rollcall::IdentityConfig;

use crate::error::ConfigError;

/// Runtime configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address.
    pub addr: SocketAddr,
    /// SQLite database path. `None` keeps everything in memory.
    pub db_path: Option<PathBuf>,
    /// Session lifetime; also the cookie's Max-Age.
    pub session_ttl: Duration,
    /// Mark the session cookie `Secure`.
    pub secure_cookie: bool,
    /// `(username, password)` of a super_admin to provision at startup.
    pub bootstrap_admin: Option<(String, String)>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            db_path: None,
            session_ttl: IdentityConfig::default().session_ttl,
            secure_cookie: false,
            bootstrap_admin: None,
        }
    }
}

impl ServerConfig {
    /// Read `ROLLCALL_*` and `PORT` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(addr) = lookup("ROLLCALL_ADDR") {
            config.addr = addr.parse().map_err(|_| ConfigError::Invalid {
                var: "ROLLCALL_ADDR",
                value: addr,
            })?;
        } else if let Some(port) = lookup("PORT") {
            let port: u16 = port.parse().map_err(|_| ConfigError::Invalid {
                var: "PORT",
                value: port,
            })?;
            config.addr.set_port(port);
        }

        config.db_path = lookup("ROLLCALL_DB")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        if let Some(secs) = lookup("ROLLCALL_SESSION_TTL_SECS") {
            let parsed: u64 = secs
                .parse()
                .ok()
                .filter(|&s| s > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    var: "ROLLCALL_SESSION_TTL_SECS",
                    value: secs.clone(),
                })?;
            config.session_ttl = Duration::from_secs(parsed);
        }

        if let Some(flag) = lookup("ROLLCALL_SECURE_COOKIE") {
            config.secure_cookie = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "ROLLCALL_SECURE_COOKIE",
                        value: flag,
                    })
                }
            };
        }

        if let Some(admin) = lookup("ROLLCALL_BOOTSTRAP_ADMIN") {
            match admin.split_once(':') {
                Some((user, pass)) if !user.trim().is_empty() && !pass.is_empty() => {
                    config.bootstrap_admin = Some((user.trim().to_string(), pass.to_string()));
                }
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "ROLLCALL_BOOTSTRAP_ADMIN",
                        value: "<redacted>".into(),
                    })
                }
            }
        }

        Ok(config)
    }

    /// The identity-service half of the configuration.
    pub fn identity_config(&self) -> IdentityConfig {
        IdentityConfig::default().with_session_ttl(self.session_ttl)
    }
}
