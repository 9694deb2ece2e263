use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seat_reservations::{config::Config, router, AppState};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting seat reservation service ({})", config.app.environment);

    let state = AppState::connect(config.clone()).await?;

    // --- Background tasks ---

    if config.reservation.sweep_interval_seconds > 0 {
        state
            .sweeper
            .clone()
            .spawn_periodic(Duration::from_secs(config.reservation.sweep_interval_seconds));
        info!("Expiry sweeper every {}s", config.reservation.sweep_interval_seconds);
    }

    if config.payment.reconcile_interval_seconds > 0 {
        state
            .reconciler
            .clone()
            .spawn_periodic(Duration::from_secs(config.payment.reconcile_interval_seconds));
    }

    // --- Web server ---

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
