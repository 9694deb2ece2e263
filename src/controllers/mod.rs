pub mod orders;
pub mod payment;
pub mod seats;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(seats::routes())
        .merge(orders::routes())
        .merge(payment::routes())
}
