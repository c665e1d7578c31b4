//! Credential configuration.
//!
//! Credentials live in a TOML file with one table per service:
//!
//! ```toml
//! [Redshift]
//! host = "example.redshift.amazonaws.com"
//! port = 5439
//! user = "analyst"
//! ```
//!
//! Every key can be overridden by an environment variable named
//! `<SECTION>_<KEY>` in upper case (`REDSHIFT_HOST`). A missing file behaves
//! like an empty one, so a fully env-driven setup needs no file at all.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable that points at the credential file.
pub const AUTH_FILE_ENV: &str = "GTI_AUTH_FILE";

/// File name used when neither an explicit path nor `GTI_AUTH_FILE` is given.
pub const DEFAULT_AUTH_FILE: &str = "auth.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(String),

    #[error("missing config value [{section}] {key} (or env {env})")]
    MissingKey {
        section: String,
        key: String,
        env: String,
    },

    #[error("invalid value for [{section}] {key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        reason: String,
    },
}

/// Name of the environment variable that overrides `section.key`.
pub fn env_var_name(section: &str, key: &str) -> String {
    format!("{}_{}", section.to_uppercase(), key.to_uppercase())
}

/// Sectioned key/value lookup with environment overrides.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
    table: toml::Table,
}

impl ConfigLoader {
    /// Load from an explicit path. A missing file yields an empty config.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using env only");
            return Ok(Self {
                path: Some(path.to_path_buf()),
                table: toml::Table::new(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut loader = Self::from_toml(&content)?;
        loader.path = Some(path.to_path_buf());
        Ok(loader)
    }

    /// Parse config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = content
            .parse()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;
        Ok(Self { path: None, table })
    }

    /// Resolve the file location: `GTI_AUTH_FILE`, then `./auth.toml`.
    pub fn from_default_location() -> Result<Self, ConfigError> {
        Self::from_file(Self::default_path())
    }

    pub fn default_path() -> PathBuf {
        std::env::var_os(AUTH_FILE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_AUTH_FILE))
    }

    /// Config-less loader; every lookup goes to the environment.
    pub fn env_only() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Look up `section.key`: environment override first, then the file.
    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        if let Ok(value) = std::env::var(env_var_name(section, key)) {
            if !value.is_empty() {
                return Some(value);
            }
        }
        self.file_value(section, key)
    }

    /// Like [`get`](Self::get) but a missing value is an error.
    pub fn require(&self, section: &str, key: &str) -> Result<String, ConfigError> {
        self.get(section, key).ok_or_else(|| ConfigError::MissingKey {
            section: section.to_string(),
            key: key.to_string(),
            env: env_var_name(section, key),
        })
    }

    /// Look up and parse a value, falling back to `default` when absent.
    pub fn parse_or<T>(&self, section: &str, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: fmt::Display,
    {
        match self.get(section, key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                section: section.to_string(),
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Section names present in the file.
    pub fn sections(&self) -> Vec<&str> {
        self.table
            .iter()
            .filter(|(_, v)| v.is_table())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Keys present in a section of the file.
    pub fn keys(&self, section: &str) -> Vec<&str> {
        self.section_table(section)
            .map(|t| t.keys().map(|k| k.as_str()).collect())
            .unwrap_or_default()
    }

    fn section_table(&self, section: &str) -> Option<&toml::Table> {
        self.table
            .get(section)
            .or_else(|| {
                self.table
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(section))
                    .map(|(_, v)| v)
            })
            .and_then(|v| v.as_table())
    }

    fn file_value(&self, section: &str, key: &str) -> Option<String> {
        let table = self.section_table(section)?;
        let value = table.get(key).or_else(|| {
            table
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })?;
        match value {
            toml::Value::String(s) => Some(s.clone()),
            toml::Value::Integer(i) => Some(i.to_string()),
            toml::Value::Float(f) => Some(f.to_string()),
            toml::Value::Boolean(b) => Some(b.to_string()),
            toml::Value::Datetime(d) => Some(d.to_string()),
            toml::Value::Array(_) | toml::Value::Table(_) => None,
        }
    }
}

/// Wrapper that keeps secrets out of `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Mask a secret for display, keeping the last four characters.
pub fn mask(value: &str) -> String {
    let n = value.chars().count();
    if n <= 4 {
        return "*".repeat(n);
    }
    let tail: String = value.chars().skip(n - 4).collect();
    format!("{}{tail}", "*".repeat(n - 4))
}

// ── Typed credentials ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RedshiftCredentials {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret,
    pub database: String,
}

impl RedshiftCredentials {
    pub const SECTION: &'static str = "Redshift";

    pub fn from_loader(loader: &ConfigLoader) -> Result<Self, ConfigError> {
        let s = Self::SECTION;
        Ok(Self {
            host: loader.require(s, "host")?,
            port: loader.parse_or(s, "port", 5439)?,
            user: loader.require(s, "user")?,
            password: Secret::new(loader.require(s, "password")?),
            database: loader.require(s, "database")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MySqlCredentials {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret,
    pub database: String,
}

impl MySqlCredentials {
    pub const SECTION: &'static str = "MySQL";

    pub fn from_loader(loader: &ConfigLoader) -> Result<Self, ConfigError> {
        let s = Self::SECTION;
        Ok(Self {
            host: loader.require(s, "host")?,
            port: loader.parse_or(s, "port", 3306)?,
            user: loader.require(s, "user")?,
            password: Secret::new(loader.require(s, "password")?),
            database: loader.require(s, "database")?,
        })
    }
}

/// AWS access keys. The same shape serves the `[AWS]` and `[DynamoDB]` sections.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: Secret,
    pub session_token: Option<Secret>,
    pub region: String,
}

impl AwsCredentials {
    pub const SECTION: &'static str = "AWS";
    pub const DYNAMODB_SECTION: &'static str = "DynamoDB";

    pub fn from_loader(loader: &ConfigLoader) -> Result<Self, ConfigError> {
        Self::from_section(loader, Self::SECTION)
    }

    pub fn dynamodb_from_loader(loader: &ConfigLoader) -> Result<Self, ConfigError> {
        Self::from_section(loader, Self::DYNAMODB_SECTION)
    }

    pub fn from_section(loader: &ConfigLoader, section: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            access_key_id: loader.require(section, "aws_access_key_id")?,
            secret_access_key: Secret::new(loader.require(section, "aws_secret_access_key")?),
            session_token: loader.get(section, "aws_session_token").map(Secret::new),
            region: loader.require(section, "region_name")?,
        })
    }
}

/// Generic broker key pair sent as `API-KEY` / `SECRET-KEY` headers.
#[derive(Debug, Clone)]
pub struct BrokerCredentials {
    pub api_key: String,
    pub secret_key: Secret,
}

impl BrokerCredentials {
    pub const SECTION: &'static str = "Broker";

    pub fn from_loader(loader: &ConfigLoader) -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: loader.require(Self::SECTION, "api_key")?,
            secret_key: Secret::new(loader.require(Self::SECTION, "secret_key")?),
        })
    }

    pub fn headers(&self) -> [(&'static str, &str); 2] {
        [
            ("API-KEY", self.api_key.as_str()),
            ("SECRET-KEY", self.secret_key.expose()),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiCredentials {
    pub api_key: Secret,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl OpenAiCredentials {
    pub const SECTION: &'static str = "OpenAI";

    pub fn from_loader(loader: &ConfigLoader) -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: Secret::new(loader.require(Self::SECTION, "api_key")?),
            model: loader.get(Self::SECTION, "model"),
            base_url: loader.get(Self::SECTION, "base_url"),
        })
    }
}

/// Interactive Brokers gateway location.
#[derive(Debug, Clone)]
pub struct IbCredentials {
    pub host: String,
    pub port: u16,
    pub client_id: u32,
    pub account: Option<String>,
}

impl IbCredentials {
    pub const SECTION: &'static str = "IB";

    pub fn from_loader(loader: &ConfigLoader) -> Result<Self, ConfigError> {
        let s = Self::SECTION;
        let host = loader.require(s, "host")?;
        let port = loader.require(s, "port")?;
        let port = port.trim().parse().map_err(|e: std::num::ParseIntError| {
            ConfigError::InvalidValue {
                section: s.to_string(),
                key: "port".to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            host,
            port,
            client_id: loader.parse_or(s, "client_id", 0)?,
            account: loader.get(s, "account"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AlpacaCredentials {
    pub api_key: String,
    pub api_secret: Secret,
    pub base_url: String,
    pub data_url: String,
}

impl AlpacaCredentials {
    pub const SECTION: &'static str = "Alpaca";
    pub const PAPER_URL: &'static str = "https://paper-api.alpaca.markets";
    pub const DATA_URL: &'static str = "https://data.alpaca.markets";

    pub fn from_loader(loader: &ConfigLoader) -> Result<Self, ConfigError> {
        let s = Self::SECTION;
        Ok(Self {
            api_key: loader.require(s, "api_key")?,
            api_secret: Secret::new(loader.require(s, "api_secret")?),
            base_url: loader
                .get(s, "base_url")
                .unwrap_or_else(|| Self::PAPER_URL.to_string()),
            data_url: loader
                .get(s, "data_url")
                .unwrap_or_else(|| Self::DATA_URL.to_string()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct BlsCredentials {
    pub api_key: Secret,
}

impl BlsCredentials {
    pub const SECTION: &'static str = "BLS";

    pub fn from_loader(loader: &ConfigLoader) -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: Secret::new(loader.require(Self::SECTION, "api_key")?),
        })
    }
}

#[derive(Debug, Clone)]
pub struct FredCredentials {
    pub api_key: Secret,
}

impl FredCredentials {
    pub const SECTION: &'static str = "Fred";

    pub fn from_loader(loader: &ConfigLoader) -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: Secret::new(loader.require(Self::SECTION, "api_key")?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[Redshift]
host = "warehouse.example.com"
port = 5439
user = "analyst"
password = "hunter2"
database = "prod"

[IB]
host = "127.0.0.1"
port = 5000
client_id = 7

[OpenAI]
api_key = "sk-test"
"#;

    #[test]
    fn file_values_are_returned_as_strings() {
        let loader = ConfigLoader::from_toml(SAMPLE).unwrap();
        assert_eq!(
            loader.get("Redshift", "host").as_deref(),
            Some("warehouse.example.com")
        );
        assert_eq!(loader.get("Redshift", "port").as_deref(), Some("5439"));
        assert_eq!(loader.get("Redshift", "missing"), None);
        assert_eq!(loader.get("Nope", "host"), None);
    }

    #[test]
    fn section_and_key_lookup_ignore_case() {
        let loader = ConfigLoader::from_toml(SAMPLE).unwrap();
        assert_eq!(loader.get("redshift", "HOST").as_deref(), Some("warehouse.example.com"));
    }

    #[test]
    fn env_override_wins_over_file() {
        // Section name unique to this test so parallel tests don't collide.
        let loader =
            ConfigLoader::from_toml("[GtiEnvTest]\ntoken = \"from-file\"\n").unwrap();
        assert_eq!(loader.get("GtiEnvTest", "token").as_deref(), Some("from-file"));

        std::env::set_var("GTIENVTEST_TOKEN", "from-env");
        assert_eq!(loader.get("GtiEnvTest", "token").as_deref(), Some("from-env"));

        std::env::set_var("GTIENVTEST_TOKEN", "");
        assert_eq!(loader.get("GtiEnvTest", "token").as_deref(), Some("from-file"));
        std::env::remove_var("GTIENVTEST_TOKEN");
    }

    #[test]
    fn env_var_name_is_upper_snake() {
        assert_eq!(env_var_name("OpenAI", "api_key"), "OPENAI_API_KEY");
        assert_eq!(env_var_name("IB", "client_id"), "IB_CLIENT_ID");
    }

    #[test]
    fn missing_file_behaves_as_empty() {
        let loader = ConfigLoader::from_file("/definitely/not/here/auth.toml").unwrap();
        assert!(loader.sections().is_empty());
        assert_eq!(loader.get("GtiMissingFileTest", "x"), None);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(matches!(
            ConfigLoader::from_toml("[Redshift\nhost ="),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn typed_credentials_parse() {
        let loader = ConfigLoader::from_toml(SAMPLE).unwrap();
        let rs = RedshiftCredentials::from_loader(&loader).unwrap();
        assert_eq!(rs.port, 5439);
        assert_eq!(rs.password.expose(), "hunter2");

        let ib = IbCredentials::from_loader(&loader).unwrap();
        assert_eq!(ib.port, 5000);
        assert_eq!(ib.client_id, 7);
    }

    #[test]
    fn missing_required_key_names_env_var() {
        let loader = ConfigLoader::from_toml("[GtiMissingKey]\n").unwrap();
        let err = loader.require("GtiMissingKey", "api_key").unwrap_err();
        assert!(err.to_string().contains("GTIMISSINGKEY_API_KEY"));
    }

    #[test]
    fn invalid_port_is_reported() {
        let loader = ConfigLoader::from_toml("[IB]\nhost = \"h\"\nport = \"abc\"\n").unwrap();
        assert!(matches!(
            IbCredentials::from_loader(&loader),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn secrets_are_hidden_from_debug() {
        let loader = ConfigLoader::from_toml(SAMPLE).unwrap();
        let creds = OpenAiCredentials::from_loader(&loader).unwrap();
        let dbg = format!("{creds:?}");
        assert!(!dbg.contains("sk-test"));
        assert!(dbg.contains("***"));
    }

    #[test]
    fn mask_keeps_last_four() {
        assert_eq!(mask("abcdefgh"), "****efgh");
        assert_eq!(mask("abc"), "***");
    }

    #[test]
    fn broker_headers() {
        let creds = BrokerCredentials {
            api_key: "k".into(),
            secret_key: Secret::new("s"),
        };
        assert_eq!(creds.headers(), [("API-KEY", "k"), ("SECRET-KEY", "s")]);
    }
}
