//! Клиент внешнего платёжного шлюза.
//!
//! Все сетевые вызовы идут через circuit breaker (`failsafe`): после серии
//! подряд идущих сбоев запросы к шлюзу блокируются на `timeout_seconds`,
//! и сервис не копит висящие соединения к неработающему шлюзу.

use failsafe::futures::CircuitBreaker as _;
use failsafe::{backoff, failure_policy, Config as BreakerConfig, StateMachine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::time::Duration;
use tracing::{error, info, warn};

use crate::config::{CircuitBreakerConfig, PaymentConfig};

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::Constant>, ()>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway circuit breaker is open")]
    CircuitOpen,
    #[error("payment gateway is not configured")]
    NotConfigured,
    #[error("payment gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("payment gateway rejected request: {0}")]
    Rejected(String),
}

// --- Модели данных для API платёжного шлюза ---

#[derive(Debug, Serialize)]
struct PaymentInitRequest {
    #[serde(rename = "teamSlug")]
    team_slug: String,
    token: String,
    amount: i64,
    #[serde(rename = "orderId")]
    order_id: String,
    currency: String,
    description: String,
    #[serde(rename = "successURL")]
    success_url: String,
    #[serde(rename = "failURL")]
    fail_url: String,
    #[serde(rename = "notificationURL")]
    notification_url: String,
    language: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentInitResponse {
    pub success: bool,
    #[serde(rename = "paymentId")]
    pub payment_id: Option<String>,
    #[serde(rename = "paymentURL")]
    pub payment_url: Option<String>,
    #[serde(rename = "expiresAt")]
    pub expires_at: Option<String>,
    pub code: Option<i32>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
struct PaymentCheckRequest {
    #[serde(rename = "teamSlug")]
    team_slug: String,
    token: String,
    #[serde(rename = "paymentId")]
    payment_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentCheckResponse {
    pub success: bool,
    pub status: Option<String>,
    #[serde(rename = "paymentId")]
    pub payment_id: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    #[serde(rename = "orderId")]
    pub order_id: Option<String>,
    pub code: Option<i32>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
struct PaymentConfirmRequest {
    #[serde(rename = "teamSlug")]
    team_slug: String,
    token: String,
    #[serde(rename = "paymentId")]
    payment_id: String,
    amount: i64,
    currency: String,
    #[serde(rename = "orderId")]
    order_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentConfirmResponse {
    pub success: bool,
    pub code: Option<i32>,
    pub message: Option<String>,
}

/// Параметры нового платежа.
#[derive(Debug, Clone)]
pub struct PaymentInit {
    pub order_id: String,
    pub amount: i64,
    pub description: String,
}

#[derive(Clone)]
pub struct PaymentGatewayClient {
    team_slug: String,
    password: String,
    base_url: String,
    currency: String,
    success_url: String,
    fail_url: String,
    webhook_url: String,
    http_client: reqwest::Client,
    breaker: Breaker,
}

impl PaymentGatewayClient {
    /// `Ok(None)`, если в конфигурации нет учётных данных мерчанта.
    pub fn from_config(
        config: &PaymentConfig,
        breaker: &CircuitBreakerConfig,
    ) -> Result<Option<Self>, GatewayError> {
        let Some((team_slug, password)) = config.credentials() else {
            warn!("MERCHANT_ID/MERCHANT_PASSWORD not set, payment gateway disabled");
            return Ok(None);
        };

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let policy = failure_policy::consecutive_failures(
            breaker.failure_threshold,
            backoff::constant(Duration::from_secs(breaker.timeout_seconds)),
        );

        Ok(Some(Self {
            team_slug: team_slug.to_string(),
            password: password.to_string(),
            base_url: config.gateway_url.trim_end_matches('/').to_string(),
            currency: config.currency.clone(),
            success_url: config.success_url.clone(),
            fail_url: config.fail_url.clone(),
            webhook_url: config.webhook_url.clone(),
            http_client,
            breaker: BreakerConfig::new().failure_policy(policy).build(),
        }))
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Разрешает ли circuit breaker сейчас обращаться к шлюзу.
    pub fn is_available(&self) -> bool {
        self.breaker.is_call_permitted()
    }

    async fn post<Req, Resp>(&self, path: &str, request: &Req) -> Result<Resp, GatewayError>
    where
        Req: Serialize + Sync,
        Resp: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.base_url, path);
        let operation = async {
            self.http_client
                .post(&url)
                .json(request)
                .send()
                .await?
                .error_for_status()?
                .json::<Resp>()
                .await
        };

        match self.breaker.call(Box::pin(operation)).await {
            Ok(response) => Ok(response),
            Err(failsafe::Error::Rejected) => {
                warn!("Circuit breaker is OPEN - blocking payment gateway request to {}", path);
                Err(GatewayError::CircuitOpen)
            }
            Err(failsafe::Error::Inner(e)) => {
                error!("Payment gateway request {} failed: {:?}", path, e);
                Err(GatewayError::Http(e))
            }
        }
    }

    pub async fn create_payment(&self, init: PaymentInit) -> Result<PaymentInitResponse, GatewayError> {
        let token = generate_init_token(init.amount, &self.currency, &init.order_id, &self.password, &self.team_slug);

        let request = PaymentInitRequest {
            team_slug: self.team_slug.clone(),
            token,
            amount: init.amount,
            order_id: init.order_id,
            currency: self.currency.clone(),
            description: init.description,
            success_url: self.success_url.clone(),
            fail_url: self.fail_url.clone(),
            notification_url: self.webhook_url.clone(),
            language: "ru".to_string(),
        };

        info!("Creating payment: amount={}, currency={}", init.amount, self.currency);
        let response: PaymentInitResponse = self.post("/api/v1/PaymentInit/init", &request).await?;
        if !response.success {
            return Err(GatewayError::Rejected(describe(response.code, response.message.as_deref())));
        }
        Ok(response)
    }

    pub async fn check_payment_status(&self, payment_id: &str) -> Result<PaymentCheckResponse, GatewayError> {
        let request = PaymentCheckRequest {
            team_slug: self.team_slug.clone(),
            token: generate_check_token(payment_id, &self.password, &self.team_slug),
            payment_id: payment_id.to_string(),
        };

        info!("Checking payment status: payment_id={}", payment_id);
        self.post("/api/v1/PaymentCheck/check", &request).await
    }

    /// Подтверждает (списывает) авторизованный платёж.
    pub async fn confirm_payment(
        &self,
        payment_id: &str,
        amount: i64,
        currency: &str,
        order_id: &str,
    ) -> Result<PaymentConfirmResponse, GatewayError> {
        let request = PaymentConfirmRequest {
            team_slug: self.team_slug.clone(),
            token: generate_init_token(amount, currency, order_id, &self.password, &self.team_slug),
            payment_id: payment_id.to_string(),
            amount,
            currency: currency.to_string(),
            order_id: order_id.to_string(),
        };

        info!("Confirming payment: payment_id={}", payment_id);
        let response: PaymentConfirmResponse = self.post("/api/v1/PaymentConfirm/confirm", &request).await?;
        if !response.success {
            return Err(GatewayError::Rejected(describe(response.code, response.message.as_deref())));
        }
        Ok(response)
    }

    /// Проверяет статус авторизованного платежа и подтверждает его.
    /// `Ok(false)`, если шлюз не вернул данных для подтверждения.
    pub async fn confirm_authorized(&self, payment_id: &str) -> Result<bool, GatewayError> {
        let check = self.check_payment_status(payment_id).await?;
        match (check.amount, check.currency, check.order_id) {
            (Some(amount), Some(currency), Some(order_id)) => {
                self.confirm_payment(payment_id, amount, &currency, &order_id).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

fn describe(code: Option<i32>, message: Option<&str>) -> String {
    match (code, message) {
        (Some(code), Some(message)) => format!("{}: {}", code, message),
        (None, Some(message)) => message.to_string(),
        (Some(code), None) => format!("code {}", code),
        (None, None) => "unknown error".to_string(),
    }
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Токен для init/confirm: sha256(amount + currency + orderId + password + teamSlug).
pub fn generate_init_token(amount: i64, currency: &str, order_id: &str, password: &str, team_slug: &str) -> String {
    sha256_hex(&format!("{}{}{}{}{}", amount, currency, order_id, password, team_slug))
}

/// Токен для check: sha256(paymentId + password + teamSlug).
pub fn generate_check_token(payment_id: &str, password: &str, team_slug: &str) -> String {
    sha256_hex(&format!("{}{}{}", payment_id, password, team_slug))
}
