/// Configuration management for the API server
///
/// Configuration comes from environment variables (a `.env` file is loaded
/// first when present). Only `DATABASE_URL` is required; every vendor
/// integration is optional and its endpoints answer 503 while unset.
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: Bind address (default: 0.0.0.0:8080)
/// - `PRODUCTION`: Enables HSTS (default: false)
/// - `CORS_ORIGINS`: Comma separated origins (default: *)
/// - `APP_BASE_URL`: Frontend URL used for Stripe redirects
/// - `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS`
/// - `SUPABASE_JWT_SECRET`: Enables Bearer token identity
/// - `SUPABASE_URL`, `SUPABASE_SERVICE_ROLE_KEY`, `SUPABASE_STORAGE_BUCKET`
/// - `STRIPE_SECRET_KEY`, `STRIPE_PRICE_ID`, `STRIPE_API_BASE`
/// - `STRIPE_WEBHOOK_SECRET`, `WEBHOOK_SIGNATURE_TOLERANCE_SECS`, `WEBHOOK_EVENT_RETENTION_DAYS`
/// - `ANTHROPIC_API_KEY`, `ANTHROPIC_MODEL`, `ANTHROPIC_API_BASE`
/// - `ELEVENLABS_API_KEY`, `ELEVENLABS_VOICE_ID`, `ELEVENLABS_API_BASE`
///
/// # Example
///
/// ```no_run
/// use mealplan_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use mealplan_shared::{ai, billing, storage};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,

    /// Supabase storage for recipe images
    pub storage: Option<StorageConfig>,

    /// Stripe checkout and portal
    pub stripe: Option<StripeConfig>,

    pub webhook: WebhookConfig,

    /// Chat assistant and food scan
    pub anthropic: Option<AnthropicConfig>,

    /// Text-to-speech
    pub elevenlabs: Option<ElevenLabsConfig>,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Enables HSTS
    pub production: bool,

    /// Allowed CORS origins (`*` allows any)
    pub cors_origins: Vec<String>,

    /// Frontend base URL, used to build Stripe redirect URLs
    pub app_base_url: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// Identity configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Supabase JWT secret; when unset only anonymous identities are accepted
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub url: String,
    pub service_role_key: String,
    pub bucket: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeConfig {
    pub secret_key: String,
    pub price_id: String,
    pub api_base: String,
}

/// Stripe webhook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Signing secret (`whsec_...`); webhooks answer 503 while unset
    pub secret: Option<String>,

    /// Maximum accepted age of a signature timestamp
    pub tolerance_secs: u64,

    /// How long processed event IDs are remembered
    pub retention_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElevenLabsConfig {
    pub api_key: String,
    pub voice_id: String,
    pub api_base: String,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing, a numeric or boolean
    /// variable does not parse, or `SUPABASE_JWT_SECRET` is shorter than
    /// 32 characters.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api = ApiConfig {
            host: get("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(get("API_PORT"), "API_PORT", 8080)?,
            production: parse_bool(get("PRODUCTION"), "PRODUCTION")?,
            cors_origins: get("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_else(|| vec!["*".to_string()]),
            app_base_url: get("APP_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
        };

        let database = DatabaseConfig {
            url: get("DATABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            max_connections: parse_or(get("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", 10)?,
        };

        let jwt_secret = get("SUPABASE_JWT_SECRET");
        if let Some(secret) = &jwt_secret {
            if secret.len() < 32 {
                anyhow::bail!("SUPABASE_JWT_SECRET must be at least 32 characters long");
            }
        }

        let storage = match (get("SUPABASE_URL"), get("SUPABASE_SERVICE_ROLE_KEY")) {
            (Some(url), Some(service_role_key)) => Some(StorageConfig {
                url,
                service_role_key,
                bucket: get("SUPABASE_STORAGE_BUCKET").unwrap_or_else(|| "recipe-images".to_string()),
            }),
            _ => None,
        };

        let stripe = match (get("STRIPE_SECRET_KEY"), get("STRIPE_PRICE_ID")) {
            (Some(secret_key), Some(price_id)) => Some(StripeConfig {
                secret_key,
                price_id,
                api_base: get("STRIPE_API_BASE")
                    .unwrap_or_else(|| billing::client::DEFAULT_API_BASE.to_string()),
            }),
            _ => None,
        };

        let webhook = WebhookConfig {
            secret: get("STRIPE_WEBHOOK_SECRET"),
            tolerance_secs: parse_or(
                get("WEBHOOK_SIGNATURE_TOLERANCE_SECS"),
                "WEBHOOK_SIGNATURE_TOLERANCE_SECS",
                billing::signature::DEFAULT_TOLERANCE.as_secs(),
            )?,
            retention_days: parse_or(get("WEBHOOK_EVENT_RETENTION_DAYS"), "WEBHOOK_EVENT_RETENTION_DAYS", 30)?,
        };
        if webhook.retention_days < 1 {
            anyhow::bail!("WEBHOOK_EVENT_RETENTION_DAYS must be at least 1");
        }

        let anthropic = get("ANTHROPIC_API_KEY").map(|api_key| AnthropicConfig {
            api_key,
            model: get("ANTHROPIC_MODEL").unwrap_or_else(|| ai::anthropic::DEFAULT_MODEL.to_string()),
            api_base: get("ANTHROPIC_API_BASE")
                .unwrap_or_else(|| ai::anthropic::DEFAULT_API_BASE.to_string()),
        });

        let elevenlabs = get("ELEVENLABS_API_KEY").map(|api_key| ElevenLabsConfig {
            api_key,
            voice_id: get("ELEVENLABS_VOICE_ID")
                .unwrap_or_else(|| ai::tts::DEFAULT_VOICE_ID.to_string()),
            api_base: get("ELEVENLABS_API_BASE")
                .unwrap_or_else(|| ai::tts::DEFAULT_API_BASE.to_string()),
        });

        Ok(Self {
            api,
            database,
            auth: AuthConfig { jwt_secret },
            storage,
            stripe,
            webhook,
            anthropic,
            elevenlabs,
        })
    }

    /// Minimal configuration with every integration disabled
    pub fn for_database(url: impl Into<String>) -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                production: false,
                cors_origins: vec!["*".to_string()],
                app_base_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                url: url.into(),
                max_connections: 10,
            },
            auth: AuthConfig::default(),
            storage: None,
            stripe: None,
            webhook: WebhookConfig {
                secret: None,
                tolerance_secs: billing::signature::DEFAULT_TOLERANCE.as_secs(),
                retention_days: 30,
            },
            anthropic: None,
            elevenlabs: None,
        }
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Largest accepted request body
    pub fn body_limit(&self) -> usize {
        // Base64 inflates scan images by a third
        storage::MAX_IMAGE_BYTES * 2
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

fn parse_bool(value: Option<String>, key: &str) -> anyhow::Result<bool> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => anyhow::bail!("{} has an invalid value '{}'", key, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "postgresql://localhost/mealplan")]).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(!config.api.production);
        assert_eq!(config.api.cors_origins, vec!["*"]);
        assert_eq!(config.api.app_base_url, "http://localhost:3000");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.webhook.tolerance_secs, 300);
        assert_eq!(config.webhook.retention_days, 30);
        assert!(config.auth.jwt_secret.is_none());
        assert!(config.storage.is_none());
        assert!(config.stripe.is_none());
        assert!(config.anthropic.is_none());
        assert!(config.elevenlabs.is_none());
    }

    #[test]
    fn test_database_url_required() {
        let err = load(&[]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_integrations_enabled() {
        let config = load(&[
            ("DATABASE_URL", "postgresql://localhost/mealplan"),
            ("PRODUCTION", "true"),
            ("CORS_ORIGINS", "https://plan.example.com, https://www.plan.example.com"),
            ("APP_BASE_URL", "https://plan.example.com/"),
            ("SUPABASE_URL", "https://abc.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service"),
            ("STRIPE_SECRET_KEY", "sk_test"),
            ("STRIPE_PRICE_ID", "price_1"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_1"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("ELEVENLABS_API_KEY", "xi"),
            ("ELEVENLABS_VOICE_ID", "voice_9"),
        ])
        .unwrap();

        assert!(config.api.production);
        assert_eq!(config.api.cors_origins.len(), 2);
        assert_eq!(config.api.app_base_url, "https://plan.example.com");
        assert_eq!(config.storage.unwrap().bucket, "recipe-images");
        assert_eq!(config.stripe.unwrap().api_base, "https://api.stripe.com");
        assert_eq!(config.webhook.secret.as_deref(), Some("whsec_1"));
        assert_eq!(config.anthropic.unwrap().model, "claude-3-5-sonnet-latest");
        assert_eq!(config.elevenlabs.unwrap().voice_id, "voice_9");
    }

    #[test]
    fn test_partial_stripe_config_is_disabled() {
        let config = load(&[
            ("DATABASE_URL", "postgresql://localhost/mealplan"),
            ("STRIPE_SECRET_KEY", "sk_test"),
        ])
        .unwrap();
        assert!(config.stripe.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(load(&[("DATABASE_URL", "x"), ("API_PORT", "eighty")]).is_err());
        assert!(load(&[("DATABASE_URL", "x"), ("PRODUCTION", "maybe")]).is_err());
        assert!(load(&[("DATABASE_URL", "x"), ("SUPABASE_JWT_SECRET", "short")]).is_err());
        assert!(load(&[("DATABASE_URL", "x"), ("WEBHOOK_EVENT_RETENTION_DAYS", "0")]).is_err());
    }

    #[test]
    fn test_bind_address() {
        let mut config = Config::for_database("postgresql://localhost/test");
        config.api.port = 9000;
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
    }
}
