//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use alert_watch::{RegionId, Stickers, DEFAULT_REGION_ID};
use secrecy::SecretString;
use signal_daemon::DEFAULT_BASE_URL;

/// Deployment flavor, selects the logging backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            AppEnv::Production
        } else {
            AppEnv::Development
        }
    }
}

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Alert provider base URL.
    pub api_url: String,
    pub api_key: SecretString,
    pub signal_daemon_url: String,
    /// Account the bot sends and receives as.
    pub signal_account: String,
    /// Status server bind address.
    pub addr: SocketAddr,
    pub environment: AppEnv,
    /// Region used by single-region commands without an id.
    pub default_region: RegionId,
    pub poll_interval: Duration,
    /// Stickers for single-region flips; alert text is sent when unset.
    pub stickers: Option<Stickers>,
}

impl BotConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `ALERT_API_URL` | Alert provider base URL | (required) |
    /// | `ALERT_API_KEY` | Alert provider API key | (required) |
    /// | `SIGNAL_DAEMON_URL` | Signal daemon URL | `http://127.0.0.1:8080` |
    /// | `SIGNAL_ACCOUNT` | Bot phone number | (required) |
    /// | `PORT` | Status server port | `3000` |
    /// | `APP_ENV` | `production` for JSON logs | `development` |
    /// | `ALERT_REGION_ID` | Default region | `25` |
    /// | `ALERT_POLL_INTERVAL_SECS` | Poll period in seconds | `5` |
    /// | `ALERT_STICKER_RAISED` | `packId:stickerId` for a raised alert | (none) |
    /// | `ALERT_STICKER_CLEARED` | `packId:stickerId` for a cleared alert | (none) |
    ///
    /// The two sticker variables are set together or not at all.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let api_url = required("ALERT_API_URL")?;
        let api_key = SecretString::from(required("ALERT_API_KEY")?);
        let signal_account = required("SIGNAL_ACCOUNT")?;

        let signal_daemon_url =
            lookup("SIGNAL_DAEMON_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let port: u16 = parse_or(&lookup, "PORT", 3000)?;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let environment = lookup("APP_ENV")
            .map(|v| AppEnv::parse(&v))
            .unwrap_or(AppEnv::Development);

        let default_region = parse_or(&lookup, "ALERT_REGION_ID", DEFAULT_REGION_ID)?;

        let poll_secs: u64 = parse_or(&lookup, "ALERT_POLL_INTERVAL_SECS", 5)?;
        if poll_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "ALERT_POLL_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }

        let sticker = |key: &'static str| -> Result<Option<String>, ConfigError> {
            match lookup(key).filter(|v| !v.trim().is_empty()) {
                Some(value) if is_sticker_ref(&value) => Ok(Some(value.trim().to_string())),
                Some(value) => Err(ConfigError::Invalid { var: key, value }),
                None => Ok(None),
            }
        };
        let stickers = match (sticker("ALERT_STICKER_RAISED")?, sticker("ALERT_STICKER_CLEARED")?) {
            (Some(raised), Some(cleared)) => Some(Stickers { raised, cleared }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("ALERT_STICKER_CLEARED")),
            (None, Some(_)) => return Err(ConfigError::Missing("ALERT_STICKER_RAISED")),
        };

        Ok(Self {
            api_url,
            api_key,
            signal_daemon_url,
            signal_account,
            addr,
            environment,
            default_region,
            poll_interval: Duration::from_secs(poll_secs),
            stickers,
        })
    }
}

/// Whether `value` looks like `packId:stickerId`.
fn is_sticker_ref(value: &str) -> bool {
    matches!(value.trim().split_once(':'), Some((pack, id)) if !pack.is_empty() && !id.is_empty())
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}
