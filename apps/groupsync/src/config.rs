use std::time::Duration;

use groupsync_core::SyncSettings;
use groupsync_google::default_scopes;
use groupsync_ldap::{LdapConfig, DEFAULT_GROUP_FILTER, DEFAULT_LDAPS_PORT};
use secrecy::SecretString;

/// Runtime configuration, read from the environment.
#[derive(Clone)]
pub struct AppConfig {
    /// Admin user impersonated through domain-wide delegation.
    pub delegated_subject: String,

    /// Domain appended to group names that are not already emails.
    pub group_domain: String,

    /// Log level used when `RUST_LOG` is not set. Default: INFO.
    pub log_level: String,

    /// Path to the service account key file.
    pub service_account_path: Option<String>,

    /// Inline service account key JSON.
    pub service_account_json: Option<SecretString>,

    /// OAuth2 scopes. Default: group and group member scopes.
    pub scopes: Vec<String>,

    /// Customer account for group listing.
    pub customer_id: Option<String>,

    /// Only target groups whose name starts with this prefix are read.
    pub group_name_prefix: Option<String>,

    pub ad_server: Option<String>,
    pub ad_user: Option<String>,
    pub ad_password: Option<SecretString>,
    pub ad_base_dn: Option<String>,

    /// `cn` pattern for AD groups. Default: `AWS_*`.
    pub ad_group_filter: String,

    /// Use LDAPS. Default: true.
    pub ad_use_ssl: bool,

    /// Default: 636.
    pub ad_port: u16,

    /// Attempts per remote call. Default: 5.
    pub retry_tries: u32,

    /// HTTP request timeout. Default: 30 seconds.
    pub http_timeout: Duration,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("delegated_subject", &self.delegated_subject)
            .field("group_domain", &self.group_domain)
            .field("log_level", &self.log_level)
            .field("service_account_path", &self.service_account_path)
            .field(
                "service_account_json",
                &self.service_account_json.as_ref().map(|_| "[REDACTED]"),
            )
            .field("scopes", &self.scopes)
            .field("customer_id", &self.customer_id)
            .field("group_name_prefix", &self.group_name_prefix)
            .field("ad_server", &self.ad_server)
            .field("ad_user", &self.ad_user)
            .field("ad_password", &self.ad_password.as_ref().map(|_| "[REDACTED]"))
            .field("ad_base_dn", &self.ad_base_dn)
            .field("ad_group_filter", &self.ad_group_filter)
            .field("ad_use_ssl", &self.ad_use_ssl)
            .field("ad_port", &self.ad_port)
            .field("retry_tries", &self.retry_tries)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// This allows tests to supply variables without mutating process-global
    /// environment state.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let optional = |key: &str| {
            reader(key)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| optional(key).ok_or_else(|| ConfigError::MissingVar(key.into()));

        let delegated_subject = required("GAUTH_GOOGLE_DELEGATED_SUBJECT")?;
        let group_domain = required("GROUP_DOMAIN")?;

        let log_level = optional("LOG_LEVEL")
            .unwrap_or_else(|| "INFO".to_string())
            .to_uppercase();

        let scopes = optional("GAUTH_SCOPES")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|scopes| !scopes.is_empty())
            .unwrap_or_else(default_scopes);

        let ad_use_ssl = match optional("AD_USE_SSL") {
            None => true,
            Some(v) => v.eq_ignore_ascii_case("true"),
        };

        let ad_port = optional("AD_PORT")
            .map_or(Ok(DEFAULT_LDAPS_PORT), |v| v.parse::<u16>())
            .map_err(|e| ConfigError::InvalidValue("AD_PORT".into(), e.to_string()))?;

        let retry_tries = optional("SYNC_RETRY_TRIES")
            .map_or(Ok(5), |v| v.parse::<u32>())
            .map_err(|e| ConfigError::InvalidValue("SYNC_RETRY_TRIES".into(), e.to_string()))?;
        if retry_tries == 0 {
            return Err(ConfigError::InvalidValue(
                "SYNC_RETRY_TRIES".into(),
                "must be at least 1".into(),
            ));
        }

        let http_timeout_secs = optional("HTTP_TIMEOUT_SECS")
            .map_or(Ok(30), |v| v.parse::<u64>())
            .map_err(|e| ConfigError::InvalidValue("HTTP_TIMEOUT_SECS".into(), e.to_string()))?;

        Ok(Self {
            delegated_subject,
            group_domain,
            log_level,
            service_account_path: optional("GOOGLE_APPLICATION_CREDENTIALS"),
            service_account_json: optional("SERVICE_ACCOUNT_JSON").map(SecretString::from),
            scopes,
            customer_id: optional("GAUTH_CUSTOMER_ID"),
            group_name_prefix: optional("GROUP_NAME_PREFIX"),
            ad_server: optional("AD_SERVER"),
            ad_user: optional("AD_USER"),
            ad_password: optional("AD_PASSWORD").map(SecretString::from),
            ad_base_dn: optional("AD_BASE_DN"),
            ad_group_filter: optional("AD_GROUP_FILTER")
                .unwrap_or_else(|| DEFAULT_GROUP_FILTER.to_string()),
            ad_use_ssl,
            ad_port,
            retry_tries,
            http_timeout: Duration::from_secs(http_timeout_secs),
        })
    }

    /// Default tracing directive derived from `LOG_LEVEL`.
    pub fn log_directive(&self) -> String {
        match self.log_level.as_str() {
            "WARNING" => "warn".to_string(),
            "CRITICAL" | "FATAL" => "error".to_string(),
            level => level.to_lowercase(),
        }
    }

    /// Connection settings for the AD source.
    pub fn ldap_config(&self) -> Result<LdapConfig, ConfigError> {
        let server = self
            .ad_server
            .clone()
            .ok_or_else(|| ConfigError::MissingVar("AD_SERVER".into()))?;
        let base_dn = self
            .ad_base_dn
            .clone()
            .ok_or_else(|| ConfigError::MissingVar("AD_BASE_DN".into()))?;

        let mut config = LdapConfig::new(server, base_dn);
        config.port = self.ad_port;
        config.use_ssl = self.ad_use_ssl;
        config.group_filter.clone_from(&self.ad_group_filter);

        match (&self.ad_user, &self.ad_password) {
            (Some(user), Some(password)) => {
                Ok(config.with_credentials(user.clone(), password.clone()))
            }
            (Some(_), None) => Err(ConfigError::MissingVar("AD_PASSWORD".into())),
            (None, Some(_)) => Err(ConfigError::MissingVar("AD_USER".into())),
            (None, None) => Ok(config),
        }
    }

    /// Settings for one sync run.
    pub fn sync_settings(&self, dry_run: bool) -> SyncSettings {
        SyncSettings {
            group_domain: self.group_domain.clone(),
            customer_id: self.customer_id.clone(),
            group_name_prefix: self.group_name_prefix.clone(),
            dry_run,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}
