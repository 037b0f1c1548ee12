use tradeflow_core::OrganizationId;
use tradeflow_events::EventBus;
use tradeflow_ledger::{HistoryQuery, HistoryRecord};

use super::{LedgerService, ServiceResult};
use crate::events::LedgerEnvelope;
use crate::store::LedgerStore;

impl<S, B> LedgerService<S, B>
where
    S: LedgerStore,
    B: EventBus<LedgerEnvelope>,
{
    /// Bucket movements matching `query`, newest first.
    pub async fn list_history(
        &self,
        organization: OrganizationId,
        query: &HistoryQuery,
    ) -> ServiceResult<Vec<HistoryRecord>> {
        Ok(self.store.history(organization, query).await?)
    }
}
