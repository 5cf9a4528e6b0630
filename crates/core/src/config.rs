use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub sheets: SheetsConfig,
    pub geocoder: GeocoderConfig,
    pub logistics: LogisticsConfig,
    pub store: StoreConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub payment_provider_token: SecretString,
    pub api_base_url: String,
    pub poll_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SheetsConfig {
    pub api_key: SecretString,
    pub spreadsheet_id: String,
    pub range: String,
    pub base_url: String,
    pub refresh_interval_secs: u64,
    pub fetch_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct GeocoderConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub timeout_secs: u64,
}

/// Origin route point and cargo defaults for delivery quoting.
#[derive(Clone, Debug)]
pub struct LogisticsConfig {
    pub token: SecretString,
    pub base_url: String,
    pub timeout_secs: u64,
    pub city_prefix: String,
    pub origin_name: String,
    pub origin_street: String,
    pub origin_building: String,
    pub origin_lat: f64,
    pub origin_lon: f64,
    pub default_cargo_weight_kg: f64,
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub pickup_address: String,
    pub agent_phone: String,
    pub review_link: Option<String>,
    pub currency: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub bot_token: Option<String>,
    pub payment_provider_token: Option<String>,
    pub sheets_api_key: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub geocoder_api_key: Option<String>,
    pub logistics_token: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig {
                bot_token: String::new().into(),
                payment_provider_token: String::new().into(),
                api_base_url: "https://api.telegram.org".to_string(),
                poll_timeout_secs: 30,
            },
            sheets: SheetsConfig {
                api_key: String::new().into(),
                spreadsheet_id: String::new(),
                range: "Catalog!A1:Z500".to_string(),
                base_url: "https://sheets.googleapis.com/v4/spreadsheets".to_string(),
                refresh_interval_secs: 600,
                fetch_timeout_secs: 30,
            },
            geocoder: GeocoderConfig {
                api_key: String::new().into(),
                base_url: "https://geocode-maps.yandex.ru/v1".to_string(),
                timeout_secs: 10,
            },
            logistics: LogisticsConfig {
                token: String::new().into(),
                base_url: "https://b2b.taxi.yandex.net/b2b/cargo/integration/v2".to_string(),
                timeout_secs: 15,
                city_prefix: "Saint Petersburg".to_string(),
                origin_name: "Rentatool pickup point".to_string(),
                origin_street: "Kamennoostrovsky".to_string(),
                origin_building: "61".to_string(),
                origin_lat: 59.9728,
                origin_lon: 30.3057,
                default_cargo_weight_kg: 5.0,
            },
            store: StoreConfig {
                pickup_address: "Kamennoostrovsky 61, unit 1".to_string(),
                agent_phone: "+7 000 000-00-00".to_string(),
                review_link: None,
                currency: "RUB".to_string(),
            },
            server: ServerConfig { bind_address: "0.0.0.0".to_string(), health_check_port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl AppConfig {
    /// Defaults, then an optional `rentatool.toml` patch, then `RENTATOOL_*`
    /// environment overrides, then programmatic overrides, then validation.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let maybe_path = resolve_config_path(options.config_path.as_deref());
        if let Some(path) = maybe_path {
            config.apply_patch(read_patch(&path)?);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("rentatool.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;
        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(telegram) = patch.telegram {
            if let Some(token) = telegram.bot_token {
                self.telegram.bot_token = token.into();
            }
            if let Some(token) = telegram.payment_provider_token {
                self.telegram.payment_provider_token = token.into();
            }
            if let Some(url) = telegram.api_base_url {
                self.telegram.api_base_url = url;
            }
            if let Some(secs) = telegram.poll_timeout_secs {
                self.telegram.poll_timeout_secs = secs;
            }
        }

        if let Some(sheets) = patch.sheets {
            if let Some(key) = sheets.api_key {
                self.sheets.api_key = key.into();
            }
            if let Some(id) = sheets.spreadsheet_id {
                self.sheets.spreadsheet_id = id;
            }
            if let Some(range) = sheets.range {
                self.sheets.range = range;
            }
            if let Some(url) = sheets.base_url {
                self.sheets.base_url = url;
            }
            if let Some(secs) = sheets.refresh_interval_secs {
                self.sheets.refresh_interval_secs = secs;
            }
            if let Some(secs) = sheets.fetch_timeout_secs {
                self.sheets.fetch_timeout_secs = secs;
            }
        }

        if let Some(geocoder) = patch.geocoder {
            if let Some(key) = geocoder.api_key {
                self.geocoder.api_key = key.into();
            }
            if let Some(url) = geocoder.base_url {
                self.geocoder.base_url = url;
            }
            if let Some(secs) = geocoder.timeout_secs {
                self.geocoder.timeout_secs = secs;
            }
        }

        if let Some(logistics) = patch.logistics {
            if let Some(token) = logistics.token {
                self.logistics.token = token.into();
            }
            if let Some(url) = logistics.base_url {
                self.logistics.base_url = url;
            }
            if let Some(secs) = logistics.timeout_secs {
                self.logistics.timeout_secs = secs;
            }
            if let Some(prefix) = logistics.city_prefix {
                self.logistics.city_prefix = prefix;
            }
            if let Some(name) = logistics.origin_name {
                self.logistics.origin_name = name;
            }
            if let Some(street) = logistics.origin_street {
                self.logistics.origin_street = street;
            }
            if let Some(building) = logistics.origin_building {
                self.logistics.origin_building = building;
            }
            if let Some(lat) = logistics.origin_lat {
                self.logistics.origin_lat = lat;
            }
            if let Some(lon) = logistics.origin_lon {
                self.logistics.origin_lon = lon;
            }
            if let Some(weight) = logistics.default_cargo_weight_kg {
                self.logistics.default_cargo_weight_kg = weight;
            }
        }

        if let Some(store) = patch.store {
            if let Some(address) = store.pickup_address {
                self.store.pickup_address = address;
            }
            if let Some(phone) = store.agent_phone {
                self.store.agent_phone = phone;
            }
            if let Some(link) = store.review_link {
                self.store.review_link = Some(link);
            }
            if let Some(currency) = store.currency {
                self.store.currency = currency;
            }
        }

        if let Some(server) = patch.server {
            if let Some(address) = server.bind_address {
                self.server.bind_address = address;
            }
            if let Some(port) = server.health_check_port {
                self.server.health_check_port = port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("RENTATOOL_BOT_TOKEN") {
            self.telegram.bot_token = value.into();
        }
        if let Some(value) = read_env("RENTATOOL_PAYMENT_PROVIDER_TOKEN") {
            self.telegram.payment_provider_token = value.into();
        }
        if let Some(value) = read_env("RENTATOOL_SHEETS_API_KEY") {
            self.sheets.api_key = value.into();
        }
        if let Some(value) = read_env("RENTATOOL_SPREADSHEET_ID") {
            self.sheets.spreadsheet_id = value;
        }
        if let Some(value) = read_env("RENTATOOL_SHEETS_RANGE") {
            self.sheets.range = value;
        }
        if let Some(value) = read_env("RENTATOOL_REFRESH_INTERVAL_SECS") {
            self.sheets.refresh_interval_secs =
                parse_u64("RENTATOOL_REFRESH_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("RENTATOOL_GEOCODER_API_KEY") {
            self.geocoder.api_key = value.into();
        }
        if let Some(value) = read_env("RENTATOOL_LOGISTICS_TOKEN") {
            self.logistics.token = value.into();
        }
        if let Some(value) = read_env("RENTATOOL_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("RENTATOOL_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(token) = overrides.bot_token {
            self.telegram.bot_token = token.into();
        }
        if let Some(token) = overrides.payment_provider_token {
            self.telegram.payment_provider_token = token.into();
        }
        if let Some(key) = overrides.sheets_api_key {
            self.sheets.api_key = key.into();
        }
        if let Some(id) = overrides.spreadsheet_id {
            self.sheets.spreadsheet_id = id;
        }
        if let Some(key) = overrides.geocoder_api_key {
            self.geocoder.api_key = key.into();
        }
        if let Some(token) = overrides.logistics_token {
            self.logistics.token = token.into();
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    /// Missing credentials are a startup fault, not something to discover on
    /// the first user interaction.
    fn validate(&self) -> Result<(), ConfigError> {
        let required: [(&str, &SecretString); 5] = [
            ("telegram.bot_token", &self.telegram.bot_token),
            ("telegram.payment_provider_token", &self.telegram.payment_provider_token),
            ("sheets.api_key", &self.sheets.api_key),
            ("geocoder.api_key", &self.geocoder.api_key),
            ("logistics.token", &self.logistics.token),
        ];
        for (name, secret) in required {
            if secret.expose_secret().trim().is_empty() {
                return Err(ConfigError::Validation(format!("`{name}` must be set")));
            }
        }
        if self.sheets.spreadsheet_id.trim().is_empty() {
            return Err(ConfigError::Validation("`sheets.spreadsheet_id` must be set".into()));
        }
        if self.sheets.refresh_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "`sheets.refresh_interval_secs` must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    let default = PathBuf::from("rentatool.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    telegram: Option<TelegramPatch>,
    sheets: Option<SheetsPatch>,
    geocoder: Option<GeocoderPatch>,
    logistics: Option<LogisticsPatch>,
    store: Option<StorePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    payment_provider_token: Option<String>,
    api_base_url: Option<String>,
    poll_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetsPatch {
    api_key: Option<String>,
    spreadsheet_id: Option<String>,
    range: Option<String>,
    base_url: Option<String>,
    refresh_interval_secs: Option<u64>,
    fetch_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct GeocoderPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LogisticsPatch {
    token: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    city_prefix: Option<String>,
    origin_name: Option<String>,
    origin_street: Option<String>,
    origin_building: Option<String>,
    origin_lat: Option<f64>,
    origin_lon: Option<f64>,
    default_cargo_weight_kg: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct StorePatch {
    pickup_address: Option<String>,
    agent_phone: Option<String>,
    review_link: Option<String>,
    currency: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
