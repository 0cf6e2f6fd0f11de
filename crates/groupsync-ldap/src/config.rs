//! Active Directory connection configuration.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::{LdapResult, LdapSourceError};

/// Default group name pattern (`cn` filter; `*` is a wildcard).
pub const DEFAULT_GROUP_FILTER: &str = "AWS_*";

/// Default LDAPS port.
pub const DEFAULT_LDAPS_PORT: u16 = 636;

/// Configuration for the AD group source.
#[derive(Clone)]
pub struct LdapConfig {
    /// Server hostname, or a full `ldap://` / `ldaps://` URL.
    pub server: String,

    /// Server port (636 for LDAPS, 389 for LDAP).
    pub port: u16,

    /// Use SSL/TLS (LDAPS).
    pub use_ssl: bool,

    /// Search base for groups.
    pub base_dn: String,

    /// Pattern matched against group `cn`.
    pub group_filter: String,

    /// Bind DN or user principal; anonymous bind when absent.
    pub bind_dn: Option<String>,

    /// Bind password.
    pub bind_password: Option<SecretString>,

    /// Connection timeout.
    pub connect_timeout: Duration,
}

impl std::fmt::Debug for LdapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("use_ssl", &self.use_ssl)
            .field("base_dn", &self.base_dn)
            .field("group_filter", &self.group_filter)
            .field("bind_dn", &self.bind_dn)
            .field(
                "bind_password",
                &self.bind_password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl LdapConfig {
    /// Creates a configuration with default port, TLS and group filter.
    #[must_use]
    pub fn new(server: impl Into<String>, base_dn: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port: DEFAULT_LDAPS_PORT,
            use_ssl: true,
            base_dn: base_dn.into(),
            group_filter: DEFAULT_GROUP_FILTER.to_string(),
            bind_dn: None,
            bind_password: None,
            connect_timeout: Duration::from_secs(30),
        }
    }

    /// Set simple bind credentials.
    #[must_use]
    pub fn with_credentials(mut self, bind_dn: impl Into<String>, password: SecretString) -> Self {
        self.bind_dn = Some(bind_dn.into());
        self.bind_password = Some(password);
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the server, base DN or group filter is empty, or
    /// the port is zero.
    pub fn validate(&self) -> LdapResult<()> {
        if self.server.trim().is_empty() {
            return Err(LdapSourceError::Config("AD server is required".into()));
        }
        if self.base_dn.trim().is_empty() {
            return Err(LdapSourceError::Config("AD base DN is required".into()));
        }
        if self.group_filter.trim().is_empty() {
            return Err(LdapSourceError::Config("AD group filter must not be empty".into()));
        }
        if self.port == 0 {
            return Err(LdapSourceError::Config("AD port must be non-zero".into()));
        }
        Ok(())
    }

    /// Connection URL.
    #[must_use]
    pub fn url(&self) -> String {
        let server = self.server.trim();
        if server.contains("://") {
            return server.to_string();
        }
        let scheme = if self.use_ssl { "ldaps" } else { "ldap" };
        format!("{scheme}://{server}:{}", self.port)
    }
}
