//! Configuration types.
//!
//! Everything is read from environment variables once at startup.
//! `from_lookup` takes the lookup function so tests can feed a map instead of
//! mutating the process environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::LlmConfig;

/// Default bind port.
const DEFAULT_PORT: u16 = 3003;

/// Agent runtime configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Agent used when a chat request names none.
    pub default_agent: String,
    /// Maximum LLM round trips per turn.
    pub max_steps: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default_agent: "profile-agent".to_string(),
            max_steps: 8,
        }
    }
}

/// Database locations.
///
/// Without `remote_url` the primary is the local file at `primary_path`.
/// With it, the primary is a remote libSQL server and `replica_path` may
/// name a local embedded replica of it.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub primary_path: PathBuf,
    pub remote_url: Option<String>,
    pub auth_token: Option<SecretString>,
    pub replica_path: Option<PathBuf>,
    /// How often the embedded replica pulls from the primary.
    pub sync_interval: Duration,
}

/// Endpoints for the weather lookups.
#[derive(Debug, Clone)]
pub struct WeatherConfig {
    pub geocoding_url: String,
    pub forecast_url: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            geocoding_url: "https://geocoding-api.open-meteo.com/v1/search".to_string(),
            forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
        }
    }
}

/// Full server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    /// Raw `API_TOKENS` table, parsed by the static verifier.
    pub api_tokens: Option<SecretString>,
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub enrichment_url: Option<String>,
    pub weather: WeatherConfig,
    pub cors_origins: Vec<String>,
    pub log_dir: Option<PathBuf>,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("OPENAI_API_KEY").ok_or_else(|| ConfigError::MissingRequired {
            key: "OPENAI_API_KEY".to_string(),
            hint: "export OPENAI_API_KEY=sk-...".to_string(),
        })?;

        let llm = LlmConfig {
            api_key: SecretString::from(api_key),
            base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: get("AGENT_MODEL").unwrap_or_else(|| "gpt-4.1-mini".to_string()),
            timeout: Duration::from_secs(parse_or(&get, "LLM_TIMEOUT_SECS", 60u64)?),
        };

        let agent = AgentConfig {
            max_steps: parse_or(&get, "AGENT_MAX_STEPS", AgentConfig::default().max_steps)?,
            ..AgentConfig::default()
        };
        if agent.max_steps == 0 {
            return Err(ConfigError::InvalidValue {
                key: "AGENT_MAX_STEPS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let defaults = WeatherConfig::default();
        let weather = WeatherConfig {
            geocoding_url: get("WEATHER_GEOCODING_URL").unwrap_or(defaults.geocoding_url),
            forecast_url: get("WEATHER_FORECAST_URL").unwrap_or(defaults.forecast_url),
        };

        let cors_origins = get("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let database = DatabaseConfig {
            primary_path: get("DATABASE_PRIMARY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/humblebrag.db")),
            remote_url: get("DATABASE_URL"),
            auth_token: get("DATABASE_AUTH_TOKEN").map(SecretString::from),
            replica_path: get("DATABASE_REPLICA_PATH").map(PathBuf::from),
            sync_interval: Duration::from_secs(parse_or(&get, "DATABASE_SYNC_INTERVAL_SECS", 30u64)?),
        };
        if database.replica_path.is_some() && database.remote_url.is_none() {
            return Err(ConfigError::InvalidValue {
                key: "DATABASE_REPLICA_PATH".to_string(),
                message: "an embedded replica needs DATABASE_URL".to_string(),
            });
        }

        Ok(Self {
            host: get("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&get, "API_PORT", DEFAULT_PORT)?,
            database,
            api_tokens: get("API_TOKENS").map(SecretString::from),
            llm,
            agent,
            enrichment_url: get("ENRICHMENT_API_URL"),
            weather,
            cors_origins,
            log_dir: get("LOG_DIR").map(PathBuf::from),
        })
    }

    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}
