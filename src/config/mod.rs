//! Configuration management
//!
//! This module handles loading and parsing configuration for the wellbeing hub.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Page cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Upload configuration
    #[serde(default)]
    pub upload: UploadConfig,
    /// Sign-in configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Outgoing email configuration
    #[serde(default)]
    pub email: EmailConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Public base URL, used to build magic links
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Site name shown in emails
    #[serde(default = "default_site_name")]
    pub site_name: String,
    /// Take the client address from `X-Forwarded-For` (only behind a proxy)
    #[serde(default)]
    pub trust_proxy: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            base_url: default_base_url(),
            site_name: default_site_name(),
            trust_proxy: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_site_name() -> String {
    "Wellbeing Hub".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/wellbeing.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Page cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached pages
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_ttl() -> u64 {
    3600
}

fn default_max_capacity() -> u64 {
    10_000
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Upload directory path
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// URL prefix uploaded files are served under
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,
    /// Maximum file size in bytes (default: 10MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Allowed document MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            public_prefix: default_public_prefix(),
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_public_prefix() -> String {
    "/uploads".to_string()
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "application/pdf".to_string(),
        "application/msword".to_string(),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document".to_string(),
        "application/vnd.ms-excel".to_string(),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
    ]
}

impl UploadConfig {
    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == mime_type)
    }

    /// Get file extension for a MIME type
    pub fn get_extension(&self, mime_type: &str) -> &'static str {
        match mime_type {
            "application/pdf" => "pdf",
            "application/msword" => "doc",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
            "application/vnd.ms-excel" => "xls",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
            _ => "bin",
        }
    }
}

/// Sign-in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Email domains that may sign in
    #[serde(default = "default_allowed_domains")]
    pub allowed_domains: Vec<String>,
    /// Magic link lifetime in seconds
    #[serde(default = "default_magic_link_expires")]
    pub magic_link_expires_seconds: i64,
    /// Session lifetime in days
    #[serde(default = "default_session_expires_days")]
    pub session_expires_days: i64,
    /// Extra origins a post-sign-in callback URL may point to.
    /// `server.base_url` is always trusted.
    #[serde(default)]
    pub trusted_origins: Vec<String>,
    /// Set the `Secure` attribute on the session cookie
    #[serde(default)]
    pub secure_cookies: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            allowed_domains: default_allowed_domains(),
            magic_link_expires_seconds: default_magic_link_expires(),
            session_expires_days: default_session_expires_days(),
            trusted_origins: Vec::new(),
            secure_cookies: false,
        }
    }
}

fn default_allowed_domains() -> Vec<String> {
    [
        "lexusoftownsville.com.au",
        "mikecarneytoyota.com.au",
        "inghamtoyota.com.au",
        "charterstowerstoyota.com.au",
        "charterstowersthmahindra.com.au",
        "mikecarneymahindra.com.au",
        "4wdc.com.au",
    ]
    .iter()
    .map(|d| d.to_string())
    .collect()
}

fn default_magic_link_expires() -> i64 {
    300
}

fn default_session_expires_days() -> i64 {
    7
}

/// Outgoing email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Delivery transport
    #[serde(default)]
    pub driver: EmailDriver,
    /// Sender address
    #[serde(default = "default_from_address")]
    pub from_address: String,
    /// Sender display name
    #[serde(default = "default_site_name")]
    pub from_name: String,
    /// Inbox notified about new staff submissions
    #[serde(default)]
    pub notify_address: Option<String>,
    /// SMTP settings
    #[serde(default)]
    pub smtp: SmtpConfig,
    /// Mailgun settings
    #[serde(default)]
    pub mailgun: MailgunConfig,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            driver: EmailDriver::default(),
            from_address: default_from_address(),
            from_name: default_site_name(),
            notify_address: None,
            smtp: SmtpConfig::default(),
            mailgun: MailgunConfig::default(),
        }
    }
}

fn default_from_address() -> String {
    "noreply@mikecarneyhealth.com".to_string()
}

/// Email transport type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmailDriver {
    /// Write messages to the log (default, for development)
    #[default]
    Log,
    /// SMTP relay
    Smtp,
    /// Mailgun HTTP API
    Mailgun,
}

/// SMTP relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

/// Mailgun API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailgunConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_mailgun_api_base")]
    pub api_base: String,
}

impl Default for MailgunConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            domain: String::new(),
            api_base: default_mailgun_api_base(),
        }
    }
}

fn default_mailgun_api_base() -> String {
    "https://api.mailgun.net".to_string()
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - WELLBEING_SERVER_HOST / _PORT / _CORS_ORIGIN / _BASE_URL / _SITE_NAME / _TRUST_PROXY
    /// - WELLBEING_DATABASE_DRIVER / _URL
    /// - WELLBEING_CACHE_TTL_SECONDS
    /// - WELLBEING_UPLOAD_PATH
    /// - WELLBEING_AUTH_ALLOWED_DOMAINS (comma separated)
    /// - WELLBEING_AUTH_SECURE_COOKIES
    /// - WELLBEING_EMAIL_DRIVER / _FROM_ADDRESS / _NOTIFY_ADDRESS
    /// - WELLBEING_SMTP_HOST / _PORT / _USERNAME / _PASSWORD
    /// - MAILGUN_API_KEY, MAILGUN_DOMAIN, MAILGUN_FROM_EMAIL
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Ok(host) = std::env::var("WELLBEING_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("WELLBEING_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("WELLBEING_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }
        if let Ok(base_url) = std::env::var("WELLBEING_SERVER_BASE_URL") {
            self.server.base_url = base_url;
        }
        if let Ok(site_name) = std::env::var("WELLBEING_SERVER_SITE_NAME") {
            self.server.site_name = site_name;
        }
        if let Ok(trust_proxy) = std::env::var("WELLBEING_SERVER_TRUST_PROXY") {
            if let Ok(trust_proxy) = trust_proxy.parse::<bool>() {
                self.server.trust_proxy = trust_proxy;
            }
        }

        // Database configuration
        if let Ok(driver) = std::env::var("WELLBEING_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("WELLBEING_DATABASE_URL") {
            self.database.url = url;
        }

        // Cache configuration
        if let Ok(ttl) = std::env::var("WELLBEING_CACHE_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.cache.ttl_seconds = ttl;
            }
        }

        // Upload configuration
        if let Ok(path) = std::env::var("WELLBEING_UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }

        // Auth configuration
        if let Ok(domains) = std::env::var("WELLBEING_AUTH_ALLOWED_DOMAINS") {
            let domains: Vec<String> = domains
                .split(',')
                .map(|d| d.trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect();
            if !domains.is_empty() {
                self.auth.allowed_domains = domains;
            }
        }
        if let Ok(secure) = std::env::var("WELLBEING_AUTH_SECURE_COOKIES") {
            if let Ok(secure) = secure.parse::<bool>() {
                self.auth.secure_cookies = secure;
            }
        }

        // Email configuration
        if let Ok(driver) = std::env::var("WELLBEING_EMAIL_DRIVER") {
            match driver.to_lowercase().as_str() {
                "log" => self.email.driver = EmailDriver::Log,
                "smtp" => self.email.driver = EmailDriver::Smtp,
                "mailgun" => self.email.driver = EmailDriver::Mailgun,
                _ => {}
            }
        }
        if let Ok(from) = std::env::var("WELLBEING_EMAIL_FROM_ADDRESS") {
            self.email.from_address = from;
        }
        if let Ok(notify) = std::env::var("WELLBEING_EMAIL_NOTIFY_ADDRESS") {
            self.email.notify_address = Some(notify);
        }
        if let Ok(host) = std::env::var("WELLBEING_SMTP_HOST") {
            self.email.smtp.host = host;
        }
        if let Ok(port) = std::env::var("WELLBEING_SMTP_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.email.smtp.port = port;
            }
        }
        if let Ok(username) = std::env::var("WELLBEING_SMTP_USERNAME") {
            self.email.smtp.username = username;
        }
        if let Ok(password) = std::env::var("WELLBEING_SMTP_PASSWORD") {
            self.email.smtp.password = password;
        }

        // Mailgun keeps the provider's conventional variable names
        if let Ok(key) = std::env::var("MAILGUN_API_KEY") {
            self.email.mailgun.api_key = key;
        }
        if let Ok(domain) = std::env::var("MAILGUN_DOMAIN") {
            self.email.mailgun.domain = domain;
        }
        if let Ok(from) = std::env::var("MAILGUN_FROM_EMAIL") {
            self.email.from_address = from;
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    const ENV_KEYS: &[&str] = &[
        "WELLBEING_SERVER_HOST",
        "WELLBEING_SERVER_PORT",
        "WELLBEING_SERVER_TRUST_PROXY",
        "WELLBEING_DATABASE_DRIVER",
        "WELLBEING_DATABASE_URL",
        "WELLBEING_AUTH_ALLOWED_DOMAINS",
        "WELLBEING_EMAIL_DRIVER",
        "MAILGUN_API_KEY",
        "MAILGUN_DOMAIN",
        "MAILGUN_FROM_EMAIL",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let config = Config::load(std::path::Path::new("/nonexistent/config.yml")).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.driver, DatabaseDriver::Sqlite);
        assert_eq!(config.database.url, "data/wellbeing.db");
        assert_eq!(config.upload.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.auth.magic_link_expires_seconds, 300);
        assert_eq!(config.auth.session_expires_days, 7);
        assert_eq!(config.email.driver, EmailDriver::Log);
        assert!(config.auth.allowed_domains.contains(&"4wdc.com.au".to_string()));
        assert!(config.auth.trusted_origins.is_empty());
        assert!(!config.server.trust_proxy);
    }

    #[test]
    fn test_load_empty_file_returns_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "   \n").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "server:\n  port: 9000\nauth:\n  allowed_domains: [\"example.org\"]\n"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.auth.allowed_domains, vec!["example.org".to_string()]);
        assert_eq!(config.auth.session_expires_days, 7);
        assert_eq!(config.upload.allowed_types.len(), 5);
    }

    #[test]
    fn test_load_invalid_yaml_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: [not, a, port\n").unwrap();

        let err = Config::load(file.path()).unwrap_err().to_string();
        assert!(err.contains("Failed to parse config file"));
    }

    #[test]
    fn test_env_override_server_and_database() {
        let _guard = lock_env();
        clear_env();
        std::env::set_var("WELLBEING_SERVER_HOST", "127.0.0.1");
        std::env::set_var("WELLBEING_SERVER_PORT", "3001");
        std::env::set_var("WELLBEING_SERVER_TRUST_PROXY", "true");
        std::env::set_var("WELLBEING_DATABASE_DRIVER", "MySQL");
        std::env::set_var("WELLBEING_DATABASE_URL", "mysql://root@localhost/hub");

        let config = Config::load_with_env(std::path::Path::new("/nonexistent.yml")).unwrap();
        clear_env();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3001);
        assert!(config.server.trust_proxy);
        assert_eq!(config.database.driver, DatabaseDriver::Mysql);
        assert_eq!(config.database.url, "mysql://root@localhost/hub");
    }

    #[test]
    fn test_env_override_invalid_values_ignored() {
        let _guard = lock_env();
        clear_env();
        std::env::set_var("WELLBEING_SERVER_PORT", "not-a-port");
        std::env::set_var("WELLBEING_DATABASE_DRIVER", "postgres");
        std::env::set_var("WELLBEING_EMAIL_DRIVER", "carrier-pigeon");

        let config = Config::load_with_env(std::path::Path::new("/nonexistent.yml")).unwrap();
        clear_env();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.driver, DatabaseDriver::Sqlite);
        assert_eq!(config.email.driver, EmailDriver::Log);
    }

    #[test]
    fn test_env_override_domains_and_mailgun() {
        let _guard = lock_env();
        clear_env();
        std::env::set_var("WELLBEING_AUTH_ALLOWED_DOMAINS", " Example.org, staff.example.com ,");
        std::env::set_var("WELLBEING_EMAIL_DRIVER", "mailgun");
        std::env::set_var("MAILGUN_API_KEY", "key-123");
        std::env::set_var("MAILGUN_DOMAIN", "mg.example.org");
        std::env::set_var("MAILGUN_FROM_EMAIL", "hub@example.org");

        let config = Config::load_with_env(std::path::Path::new("/nonexistent.yml")).unwrap();
        clear_env();

        assert_eq!(
            config.auth.allowed_domains,
            vec!["example.org".to_string(), "staff.example.com".to_string()]
        );
        assert_eq!(config.email.driver, EmailDriver::Mailgun);
        assert_eq!(config.email.mailgun.api_key, "key-123");
        assert_eq!(config.email.mailgun.domain, "mg.example.org");
        assert_eq!(config.email.from_address, "hub@example.org");
    }

    #[test]
    fn test_upload_type_checks() {
        let upload = UploadConfig::default();
        assert!(upload.is_type_allowed("application/pdf"));
        assert!(!upload.is_type_allowed("image/png"));
        assert_eq!(upload.get_extension("application/vnd.ms-excel"), "xls");
        assert_eq!(upload.get_extension("text/plain"), "bin");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn valid_config_strategy() -> impl Strategy<Value = Config> {
            (
                "[a-z0-9.]{1,20}",
                1u16..=65535,
                prop_oneof![Just(DatabaseDriver::Sqlite), Just(DatabaseDriver::Mysql)],
                "[a-z0-9/_.]{1,30}",
                prop::collection::vec("[a-z0-9]{1,10}\\.[a-z]{2,3}", 1..5),
                1i64..30,
            )
                .prop_map(|(host, port, driver, url, domains, days)| {
                    let mut config = Config::default();
                    config.server.host = host;
                    config.server.port = port;
                    config.database.driver = driver;
                    config.database.url = url;
                    config.auth.allowed_domains = domains;
                    config.auth.session_expires_days = days;
                    config
                })
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(20))]

            /// Serializing a config to YAML and loading it back yields the same values.
            #[test]
            fn config_yaml_roundtrip(config in valid_config_strategy()) {
                let yaml = serde_yaml::to_string(&config).expect("Failed to serialize config");

                let mut file = NamedTempFile::new().expect("Failed to create temp file");
                write!(file, "{}", yaml).expect("Failed to write config");

                let parsed = Config::load(file.path()).expect("Failed to parse config");

                prop_assert_eq!(config.server.host, parsed.server.host);
                prop_assert_eq!(config.server.port, parsed.server.port);
                prop_assert_eq!(config.database.driver, parsed.database.driver);
                prop_assert_eq!(config.database.url, parsed.database.url);
                prop_assert_eq!(config.auth.allowed_domains, parsed.auth.allowed_domains);
                prop_assert_eq!(config.auth.session_expires_days, parsed.auth.session_expires_days);
            }
        }
    }
}
