//! Infrastructure wiring: ledger store, event bus, services and workers.

use std::io;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use tradeflow_events::InMemoryEventBus;
use tradeflow_infra::{
    AppConfig, InMemoryLedgerStore, InMemoryOrganizationDirectory, LedgerEnvelope, LedgerService, LedgerStore,
    NotificationWorker, OrganizationResolver, PostgresLedgerStore, StoreConfig, StoreError, TracingMailer,
    WorkerHandle,
};

pub type LedgerBus = Arc<InMemoryEventBus<LedgerEnvelope>>;
pub type AppLedger = LedgerService<Arc<dyn LedgerStore>, LedgerBus>;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("ledger store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("failed to start notification worker: {0}")]
    Worker(#[from] io::Error),
}

/// Everything the handlers need, shared behind an `Arc`.
pub struct AppServices {
    pub ledger: AppLedger,
    pub organizations: Arc<dyn OrganizationResolver>,
    notifications: Mutex<Option<WorkerHandle>>,
}

impl AppServices {
    /// Stop background workers. Idempotent.
    pub fn shutdown(&self) {
        let handle = self
            .notifications
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.shutdown();
        }
    }
}

/// Build the store selected by `config`, the bus, the ledger service and the
/// notification worker.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, StartupError> {
    let store: Arc<dyn LedgerStore> = match &config.store {
        StoreConfig::InMemory => {
            tracing::info!("using in-memory ledger store");
            Arc::new(InMemoryLedgerStore::new())
        }
        StoreConfig::Postgres { url, max_connections } => {
            tracing::info!(max_connections, "using postgres ledger store");
            Arc::new(PostgresLedgerStore::connect(url, *max_connections).await?)
        }
    };

    let bus: LedgerBus = Arc::new(InMemoryEventBus::new());
    let ledger = LedgerService::new(store, bus.clone()).with_commit_retries(config.commit_retries);

    let worker = NotificationWorker::spawn(bus, TracingMailer, config.notification_recipient.clone(), None)?;

    let organizations = InMemoryOrganizationDirectory::from_seeds(&config.organizations);
    if organizations.is_empty() {
        tracing::warn!("no organizations configured; every ledger request will be rejected");
    }

    Ok(AppServices {
        ledger,
        organizations: Arc::new(organizations),
        notifications: Mutex::new(Some(worker)),
    })
}
