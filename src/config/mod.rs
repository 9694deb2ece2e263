use serde::Deserialize;
use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(#[from] config::ConfigError),
    #[error("{0} must be set")]
    Missing(&'static str),
}

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub reservation: ReservationConfig,
    pub payment: PaymentConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Настройки Redis. Без URL кеш мест отключён.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
}

// Настройки удержания мест
#[derive(Debug, Clone, Deserialize)]
pub struct ReservationConfig {
    pub default_hold_minutes: u32,
    pub max_hold_minutes: u32,
    pub max_batch_size: usize,
    /// 0 отключает фоновый свипер; встроенный в запросы свип работает всегда.
    pub sweep_interval_seconds: u64,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            default_hold_minutes: 10,
            max_hold_minutes: 60,
            max_batch_size: 50,
            sweep_interval_seconds: 60,
        }
    }
}

// Настройки платежного шлюза. Без merchant_id/merchant_password платежи отключены.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub merchant_id: Option<String>,
    pub merchant_password: Option<String>,
    pub gateway_url: String,
    pub success_url: String,
    pub fail_url: String,
    pub webhook_url: String,
    pub currency: String,
    pub pending_timeout_minutes: i64,
    pub reconcile_interval_seconds: u64,
}

impl PaymentConfig {
    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((self.merchant_id.as_deref()?, self.merchant_password.as_deref()?))
    }
}

// Настройки Circuit Breaker
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Собирает конфигурацию из значений по умолчанию и переменных окружения,
    /// полученных через `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if lookup("DATABASE_URL").is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let mut builder = config::Config::builder()
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 8000)?
            .set_default("app.environment", "development")?
            .set_default("app.rust_log", "seat_reservations=debug,tower_http=debug")?
            .set_default("database.pool_size", 20)?
            .set_default("reservation.default_hold_minutes", 10)?
            .set_default("reservation.max_hold_minutes", 60)?
            .set_default("reservation.max_batch_size", 50)?
            .set_default("reservation.sweep_interval_seconds", 60)?
            .set_default("payment.gateway_url", "https://gateway.hackload.com")?
            .set_default("payment.success_url", "https://your-domain.com/payment/success")?
            .set_default("payment.fail_url", "https://your-domain.com/payment/fail")?
            .set_default("payment.webhook_url", "https://your-domain.com/api/webhook/payment")?
            .set_default("payment.currency", "KZT")?
            .set_default("payment.pending_timeout_minutes", 15)?
            .set_default("payment.reconcile_interval_seconds", 300)?
            .set_default("circuit_breaker.failure_threshold", 5)?
            .set_default("circuit_breaker.timeout_seconds", 60)?;

        for (key, var) in ENV_OVERRIDES {
            builder = builder.set_override_option(*key, lookup(var))?;
        }

        Ok(builder.build()?.try_deserialize()?)
    }
}

// Ключ конфигурации -> переменная окружения
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("app.host", "HOST"),
    ("app.port", "PORT"),
    ("app.environment", "ENVIRONMENT"),
    ("app.rust_log", "RUST_LOG"),
    ("database.url", "DATABASE_URL"),
    ("database.pool_size", "DB_POOL_SIZE"),
    ("redis.url", "REDIS_URL"),
    ("reservation.default_hold_minutes", "HOLD_MINUTES"),
    ("reservation.max_hold_minutes", "MAX_HOLD_MINUTES"),
    ("reservation.max_batch_size", "MAX_SEATS_PER_RESERVATION"),
    ("reservation.sweep_interval_seconds", "SWEEP_INTERVAL_SECONDS"),
    ("payment.merchant_id", "MERCHANT_ID"),
    ("payment.merchant_password", "MERCHANT_PASSWORD"),
    ("payment.gateway_url", "PAYMENT_GATEWAY_URL"),
    ("payment.success_url", "PAYMENT_SUCCESS_URL"),
    ("payment.fail_url", "PAYMENT_FAIL_URL"),
    ("payment.webhook_url", "PAYMENT_WEBHOOK_URL"),
    ("payment.currency", "PAYMENT_CURRENCY"),
    ("payment.pending_timeout_minutes", "PAYMENT_PENDING_TIMEOUT_MINUTES"),
    ("payment.reconcile_interval_seconds", "PAYMENT_RECONCILE_INTERVAL_SECONDS"),
    ("circuit_breaker.failure_threshold", "CIRCUIT_BREAKER_FAILURE_THRESHOLD"),
    ("circuit_breaker.timeout_seconds", "CIRCUIT_BREAKER_TIMEOUT_SECONDS"),
];
