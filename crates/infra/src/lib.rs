//! Infrastructure layer: storage, unit of work, configuration and the
//! application services that run ledger transactions.

pub mod config;
pub mod events;
pub mod locks;
pub mod notifications;
pub mod organizations;
pub mod services;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use config::{AppConfig, ConfigError, StoreConfig};
pub use events::{LedgerEnvelope, LedgerEvent};
pub use notifications::{Mailer, NotificationWorker, TracingMailer, WorkerHandle};
pub use organizations::{InMemoryOrganizationDirectory, OrganizationResolver, OrganizationSeed};
pub use services::{LedgerService, OrderFilter, PurchaseFilter, ServiceError, ServiceResult, WarehouseFilter};
pub use store::{InMemoryLedgerStore, LedgerStore, PostgresLedgerStore, StoreError};
