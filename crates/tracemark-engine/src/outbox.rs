use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tracemark_db::{Database, outbox};
use tracemark_types::events::EngineEvent;
use tracing::{debug, error, info, warn};

/// Deliveries per event before the relay gives up on it.
pub const MAX_ATTEMPTS: u32 = 5;

const BATCH_SIZE: u32 = 100;

/// Destination for relayed events. Delivery is at-least-once.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, event: &EngineEvent) -> Result<()>;
}

/// Delivers to every gateway in order; the first failure fails the event.
pub struct Fanout {
    gateways: Vec<Arc<dyn NotificationGateway>>,
}

impl Fanout {
    pub fn new(gateways: Vec<Arc<dyn NotificationGateway>>) -> Self {
        Self { gateways }
    }
}

#[async_trait]
impl NotificationGateway for Fanout {
    fn name(&self) -> &'static str {
        "fanout"
    }

    async fn deliver(&self, event: &EngineEvent) -> Result<()> {
        for gateway in &self.gateways {
            gateway
                .deliver(event)
                .await
                .map_err(|e| e.context(format!("{} gateway", gateway.name())))?;
        }
        Ok(())
    }
}

/// Moves committed outbox rows to a gateway. Failures stay in the outbox
/// and never touch the decision that produced them.
#[derive(Clone)]
pub struct OutboxRelay {
    db: Arc<Database>,
    gateway: Arc<dyn NotificationGateway>,
}

impl OutboxRelay {
    pub fn new(db: Arc<Database>, gateway: Arc<dyn NotificationGateway>) -> Self {
        Self { db, gateway }
    }

    /// One pass over undelivered events. Returns how many were delivered.
    pub async fn drain_once(&self) -> Result<usize> {
        let rows = self
            .blocking(|db| db.pending_events(BATCH_SIZE, MAX_ATTEMPTS))
            .await?;
        let mut delivered = 0;

        for row in rows {
            let id = row.id;
            match self.gateway.deliver(&row.event).await {
                Ok(()) => {
                    self.blocking(move |db| {
                        db.with_conn(|conn| outbox::mark_delivered(conn, id, Utc::now()))
                    })
                    .await?;
                    delivered += 1;
                }
                Err(e) => {
                    let message = format!("{:#}", e);
                    let recorded = message.clone();
                    self.blocking(move |db| {
                        db.with_conn(|conn| outbox::record_failure(conn, id, &recorded))
                    })
                    .await?;
                    if row.attempts + 1 >= MAX_ATTEMPTS {
                        error!(
                            "Giving up on outbox event {} after {} attempts: {}",
                            id, MAX_ATTEMPTS, message
                        );
                    } else {
                        warn!("Outbox event {} delivery failed: {}", id, message);
                    }
                }
            }
        }

        Ok(delivered)
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db)).await?
    }
}

/// Drains the outbox on an interval.
pub async fn run_relay_loop(relay: OutboxRelay, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match relay.drain_once().await {
            Ok(0) => {}
            Ok(count) if count >= BATCH_SIZE as usize => {
                info!("Outbox: delivered {} events, more pending", count)
            }
            Ok(count) => debug!("Outbox: delivered {} events", count),
            Err(e) => warn!("Outbox relay error: {}", e),
        }
    }
}
