use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::StoreError;
use crate::store::SeatStore;

/// Возвращает в пул места с истёкшей бронью.
///
/// Свип - оптимизация, а не условие корректности: движок бронирования сам
/// считает просроченную бронь свободной, поэтому пропущенный или упавший свип
/// ничего не ломает.
#[derive(Clone)]
pub struct ExpirySweeper {
    store: Arc<dyn SeatStore>,
    clock: Arc<dyn Clock>,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn SeatStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn sweep_expired(&self) -> Result<u64, StoreError> {
        let count = self.store.sweep_expired(self.clock.now()).await?;
        if count > 0 {
            info!(count, "Expired seat holds returned to pool");
        } else {
            debug!("No expired seat holds");
        }
        Ok(count)
    }

    /// Свип перед чтением/бронированием: ошибка логируется и не блокирует вызывающего.
    pub async fn sweep_best_effort(&self) {
        if let Err(e) = self.sweep_expired().await {
            warn!("Expiry sweep failed, continuing without it: {}", e);
        }
    }

    /// Фоновый свип по таймеру, в дополнение к свипу в запросах.
    pub fn spawn_periodic(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                self.sweep_best_effort().await;
            }
        })
    }
}
