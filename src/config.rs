//! Connection configuration.

use crate::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT, DEFAULT_USERNAME};
use std::path::PathBuf;
use std::time::Duration;

/// Connection parameters for a [`crate::Session`].
///
/// Each timeout phase is seeded from a unified 3-second default and can be
/// overridden individually. `None` means "no deadline".
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname
    pub host: String,
    /// Server port
    pub port: u16,
    /// Unix socket path; takes precedence over host/port when set
    pub path: Option<PathBuf>,
    /// Username for the handshake AUTH clause
    pub username: String,
    /// Password; authentication is attempted only when set
    pub password: Option<String>,
    /// Database index selected after the handshake
    pub db: Option<i64>,
    /// Deadline for opening the transport (TLS handshake included)
    pub connect_timeout: Option<Duration>,
    /// Deadline for each read operation
    pub read_timeout: Option<Duration>,
    /// Deadline for each write operation
    pub write_timeout: Option<Duration>,
    /// Wrap the transport in TLS
    pub ssl: bool,
    /// Parameters forwarded to the TLS layer
    pub ssl_params: TlsParams,
}

/// Material and overrides forwarded to the TLS layer.
///
/// All fields are optional: with none set, the connection verifies the
/// server against the bundled web-PKI roots under the configured host name.
#[derive(Debug, Clone, Default)]
pub struct TlsParams {
    /// PEM file with additional trust anchors
    pub ca_file: Option<PathBuf>,
    /// PEM file with the client certificate chain (mTLS)
    pub cert_file: Option<PathBuf>,
    /// PEM file with the client private key (mTLS)
    pub key_file: Option<PathBuf>,
    /// Server name for SNI and verification, when it differs from `host`
    pub server_name: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            path: None,
            username: DEFAULT_USERNAME.to_string(),
            password: None,
            db: None,
            connect_timeout: Some(DEFAULT_TIMEOUT),
            read_timeout: Some(DEFAULT_TIMEOUT),
            write_timeout: Some(DEFAULT_TIMEOUT),
            ssl: false,
            ssl_params: TlsParams::default(),
        }
    }
}

impl Config {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the server port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Connect over a Unix socket instead of TCP.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the username used in the handshake.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Set the password; enables the AUTH clause of the handshake.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Select a database index after the handshake.
    pub fn db(mut self, db: i64) -> Self {
        self.db = Some(db);
        self
    }

    /// Set the connect, read, and write deadlines at once.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self.read_timeout = timeout;
        self.write_timeout = timeout;
        self
    }

    /// Override the connect deadline.
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Override the read deadline.
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Override the write deadline.
    pub fn write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Enable TLS on the transport.
    pub fn ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    /// Set the TLS parameters.
    pub fn ssl_params(mut self, params: TlsParams) -> Self {
        self.ssl_params = params;
        self
    }

    /// host:port string for TCP connects and log lines.
    pub(crate) fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Server name presented during the TLS handshake.
    #[cfg(feature = "tls")]
    pub(crate) fn tls_server_name(&self) -> &str {
        self.ssl_params.server_name.as_deref().unwrap_or(&self.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 6379);
        assert_eq!(config.username, "default");
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.read_timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.write_timeout, Some(Duration::from_secs(3)));
        assert!(!config.ssl);
    }

    #[test]
    fn test_unified_timeout_propagates() {
        let timeout = Some(Duration::from_millis(250));
        let config = Config::new().timeout(timeout);
        assert_eq!(config.connect_timeout, timeout);
        assert_eq!(config.read_timeout, timeout);
        assert_eq!(config.write_timeout, timeout);

        let config = Config::new()
            .timeout(timeout)
            .read_timeout(Some(Duration::from_secs(10)));
        assert_eq!(config.read_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.write_timeout, timeout);
    }

    #[test]
    fn test_builder() {
        let config = Config::new()
            .host("redis.internal")
            .port(6380)
            .username("svc")
            .password("hunter2")
            .db(3);
        assert_eq!(config.addr(), "redis.internal:6380");
        assert_eq!(config.password.as_deref(), Some("hunter2"));
        assert_eq!(config.db, Some(3));
    }
}
