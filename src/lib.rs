pub mod cache;
pub mod clock;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod services;
pub mod store;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    cache::CacheService,
    clock::{Clock, SystemClock},
    config::Config,
    database::Database,
    models::EventId,
    redis_client::RedisClient,
    services::{
        AvailabilityService, ExpirySweeper, OrderService, PaymentGatewayClient, PaymentReconciler,
        ReleaseEngine, ReservationEngine, RetryPolicy,
    },
    store::SeatStore,
};

// Shared state для всего приложения
pub struct AppState {
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub cache: Option<CacheService>,
    pub availability: AvailabilityService,
    pub reservations: ReservationEngine,
    pub releases: ReleaseEngine,
    pub sweeper: ExpirySweeper,
    pub reconciler: PaymentReconciler,
    pub orders: OrderService,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn SeatStore>,
        clock: Arc<dyn Clock>,
        cache: Option<CacheService>,
        gateway: Option<PaymentGatewayClient>,
    ) -> Self {
        let sweeper = ExpirySweeper::new(store.clone(), clock.clone());
        let reservations =
            ReservationEngine::new(store.clone(), clock.clone(), sweeper.clone(), config.reservation.clone());
        let reconciler = PaymentReconciler::new(
            store.clone(),
            clock.clone(),
            gateway.clone(),
            RetryPolicy::default(),
            chrono::Duration::minutes(config.payment.pending_timeout_minutes),
        );
        let orders = OrderService::new(store.clone(), clock.clone(), gateway, config.reservation.max_batch_size);

        Self {
            availability: AvailabilityService::new(store.clone(), clock.clone(), sweeper.clone()),
            releases: ReleaseEngine::new(store),
            reservations,
            sweeper,
            reconciler,
            orders,
            cache,
            clock,
            config,
        }
    }

    /// Поднимает Postgres (с миграциями), Redis и платёжный клиент по конфигурации.
    pub async fn connect(config: Config) -> anyhow::Result<Arc<Self>> {
        let db = Database::new(&config.database.url, config.database.pool_size).await?;
        info!("Database connected");
        db.run_migrations().await?;

        // Redis необязателен: без него просто нет кеша мест
        let cache = match config.redis.url.as_deref() {
            Some(url) => match RedisClient::new(url).await {
                Ok(redis) => {
                    info!("Redis connected");
                    Some(CacheService::new(redis))
                }
                Err(e) => {
                    warn!("Redis unavailable, seats cache disabled: {:?}", e);
                    None
                }
            },
            None => None,
        };

        let gateway = PaymentGatewayClient::from_config(&config.payment, &config.circuit_breaker)?;
        let store: Arc<dyn SeatStore> = Arc::new(db.seat_store());

        Ok(Arc::new(Self::new(config, store, Arc::new(SystemClock), cache, gateway)))
    }

    pub async fn invalidate_seats(&self, event_id: EventId) {
        if let Some(cache) = &self.cache {
            cache.invalidate_seats(event_id).await;
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
