use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub redis: Option<RedisConfig>,
    pub jwt: JwtConfig,
    pub store: StoreConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

/// Token signing material. Either a shared secret (HS256) or a PEM key pair
/// on disk (RS256).
#[derive(Clone, Deserialize)]
pub enum SigningKeyConfig {
    Secret(String),
    RsaKeyFiles {
        private_key_path: String,
        public_key_path: String,
    },
}

impl std::fmt::Debug for SigningKeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SigningKeyConfig::Secret(_) => f.write_str("Secret(<redacted>)"),
            SigningKeyConfig::RsaKeyFiles {
                private_key_path,
                public_key_path,
            } => f
                .debug_struct("RsaKeyFiles")
                .field("private_key_path", private_key_path)
                .field("public_key_path", public_key_path)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub signing_key: SigningKeyConfig,
    /// Lifetime of tokens handed out by login and registration.
    pub login_token_expiry_minutes: i64,
    /// Lifetime of tokens re-issued on successful protected responses.
    pub refresh_token_expiry_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub timeout_ms: u64,
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BootstrapConfig {
    pub seed_default_access: bool,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl AccessConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let redis = get_optional_env("REDIS_URL").map(|url| RedisConfig { url });

        let config = AccessConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("access-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: get_optional_env("OTLP_ENDPOINT"),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            },
            redis,
            jwt: JwtConfig {
                signing_key: signing_key_from_env()?,
                login_token_expiry_minutes: parse_env(
                    "JWT_LOGIN_TOKEN_EXPIRY_MINUTES",
                    "1",
                    is_prod,
                )?,
                refresh_token_expiry_minutes: parse_env(
                    "JWT_REFRESH_TOKEN_EXPIRY_MINUTES",
                    "15",
                    is_prod,
                )?,
            },
            store: StoreConfig {
                timeout_ms: parse_env("STORE_TIMEOUT_MS", "5000", is_prod)?,
            },
            security: SecurityConfig {
                allowed_origins: get_env("ALLOWED_ORIGINS", Some("*"), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            rate_limit: RateLimitConfig {
                login_attempts: get_env("RATE_LIMIT_LOGIN_ATTEMPTS", Some("5"), is_prod)?
                    .parse()
                    .unwrap_or(5),
                login_window_seconds: get_env(
                    "RATE_LIMIT_LOGIN_WINDOW_SECONDS",
                    Some("900"),
                    is_prod,
                )?
                .parse()
                .unwrap_or(900),
            },
            bootstrap: BootstrapConfig {
                seed_default_access: get_optional_env("SEED_DEFAULT_ACCESS")
                    .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                    .unwrap_or(false),
                admin_email: get_optional_env("BOOTSTRAP_ADMIN_EMAIL"),
                admin_password: get_optional_env("BOOTSTRAP_ADMIN_PASSWORD"),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.jwt.login_token_expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_LOGIN_TOKEN_EXPIRY_MINUTES must be positive"
            )));
        }

        if self.jwt.refresh_token_expiry_minutes < self.jwt.login_token_expiry_minutes {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_REFRESH_TOKEN_EXPIRY_MINUTES must not be shorter than the login token expiry"
            )));
        }

        if self.store.timeout_ms == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "STORE_TIMEOUT_MS must be positive"
            )));
        }

        if let SigningKeyConfig::Secret(secret) = &self.jwt.signing_key {
            if secret.len() < 32 {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "JWT_SECRET must be at least 32 bytes"
                )));
            }
        }

        if self.bootstrap.admin_email.is_some() != self.bootstrap.admin_password.is_some() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD must be set together"
            )));
        }

        if self.environment == Environment::Prod
            && self.security.allowed_origins.iter().any(|o| o == "*")
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Wildcard CORS origin not allowed in production"
            )));
        }

        Ok(())
    }
}

fn signing_key_from_env() -> Result<SigningKeyConfig, AppError> {
    let secret = get_optional_env("JWT_SECRET");
    let private_key_path = get_optional_env("JWT_PRIVATE_KEY_PATH");
    let public_key_path = get_optional_env("JWT_PUBLIC_KEY_PATH");

    match (secret, private_key_path, public_key_path) {
        (Some(secret), None, None) => Ok(SigningKeyConfig::Secret(secret)),
        (None, Some(private_key_path), Some(public_key_path)) => {
            Ok(SigningKeyConfig::RsaKeyFiles {
                private_key_path,
                public_key_path,
            })
        }
        (None, None, None) => Err(AppError::ConfigError(anyhow::anyhow!(
            "Either JWT_SECRET or JWT_PRIVATE_KEY_PATH/JWT_PUBLIC_KEY_PATH is required"
        ))),
        _ => Err(AppError::ConfigError(anyhow::anyhow!(
            "JWT_SECRET and JWT_PRIVATE_KEY_PATH/JWT_PUBLIC_KEY_PATH are mutually exclusive, and both key paths must be set"
        ))),
    }
}

fn get_optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
