//! # Core Bootstrap
//!
//! Explicit construction of every component at process start. Nothing in the
//! crate initializes itself lazily; the caller owns the pool, the
//! broadcaster's dispatcher task and the collaborator implementations.

use sqlx::PgPool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::collaborators::{
    MenuCatalog, PgMenuCatalog, PgSubscriptionStore, PgTableDirectory, SubscriptionStore,
    TableDirectory,
};
use crate::config::ComandaConfig;
use crate::database::{self, TransactionPolicy};
use crate::error::Result;
use crate::events::EventBroadcaster;
use crate::ledger::ResourceLedger;
use crate::scheduler::ReservationScheduler;
use crate::state_machine::OrderStateMachine;

/// Collaborator implementations consumed by the core
#[derive(Clone)]
pub struct Collaborators {
    pub menu: Arc<dyn MenuCatalog>,
    pub tables: Arc<dyn TableDirectory>,
    pub limits: Arc<dyn SubscriptionStore>,
}

impl Collaborators {
    /// Lookups against the shared PostgreSQL store
    pub fn postgres() -> Self {
        Self {
            menu: Arc::new(PgMenuCatalog),
            tables: Arc::new(PgTableDirectory),
            limits: Arc::new(PgSubscriptionStore),
        }
    }
}

/// Fully wired order and reservation core
pub struct ComandaCore {
    pub orders: OrderStateMachine,
    pub reservations: ReservationScheduler,
    pub ledger: ResourceLedger,
    pub broadcaster: EventBroadcaster,
    dispatcher: JoinHandle<()>,
}

impl ComandaCore {
    /// Wire the core with the PostgreSQL-backed collaborators.
    ///
    /// Must be called within a Tokio runtime; it spawns the broadcaster's
    /// dispatcher task.
    pub fn new(pool: PgPool, config: &ComandaConfig) -> Result<Self> {
        Self::with_collaborators(pool, config, Collaborators::postgres())
    }

    pub fn with_collaborators(
        pool: PgPool,
        config: &ComandaConfig,
        collaborators: Collaborators,
    ) -> Result<Self> {
        config.validate()?;

        let policy = TransactionPolicy::from(&config.transactions);
        let (broadcaster, dispatcher) = EventBroadcaster::start(&config.broadcaster);

        let orders = OrderStateMachine::new(
            pool.clone(),
            collaborators.menu,
            Arc::clone(&collaborators.tables),
            broadcaster.clone(),
            policy.clone(),
        )
        .with_auto_confirm(config.orders.auto_confirm);

        let reservations = ReservationScheduler::new(
            pool.clone(),
            collaborators.tables,
            broadcaster.clone(),
            policy.clone(),
        );

        let ledger = ResourceLedger::new(pool, collaborators.limits, policy);

        info!(
            auto_confirm = config.orders.auto_confirm,
            serialization_retries = config.transactions.serialization_retries,
            "Comanda core initialized"
        );

        Ok(Self {
            orders,
            reservations,
            ledger,
            broadcaster,
            dispatcher,
        })
    }

    /// Load configuration, connect, migrate and wire the core
    pub async fn connect(config: &ComandaConfig) -> Result<Self> {
        let pool = database::create_pool(&config.database).await?;
        database::run_migrations(&pool).await?;
        Self::new(pool, config)
    }

    /// Stop fan-out. Events still queued are discarded.
    pub fn shutdown(self) {
        self.dispatcher.abort();
        info!("Comanda core shut down");
    }
}
