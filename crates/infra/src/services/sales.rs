use tracing::info;

use tradeflow_core::{ExpectedVersion, OrganizationId};
use tradeflow_credit_notes::{RegisterSale, Sale, SaleId};
use tradeflow_events::EventBus;

use super::{LedgerService, ServiceResult};
use crate::events::LedgerEnvelope;
use crate::store::{ChangeSet, LedgerStore, fetch_all};

impl<S, B> LedgerService<S, B>
where
    S: LedgerStore,
    B: EventBus<LedgerEnvelope>,
{
    /// Register an aggregated sale. Reference data only: no ledger effect.
    pub async fn register_sale(&self, cmd: RegisterSale) -> ServiceResult<Sale> {
        let organization = cmd.organization;
        // The warehouse must exist even though its buckets are untouched.
        self.load_warehouse(organization, cmd.warehouse_id).await?;
        let catalog = self
            .catalog_for(
                organization,
                cmd.invoices.iter().flat_map(|i| i.lines.iter().map(|l| l.item)).collect::<Vec<_>>(),
            )
            .await?;

        let sale = Sale::register(cmd, &catalog)?;

        let mut changes = ChangeSet::new();
        changes.put(&sale, ExpectedVersion::Exact(0))?;
        self.store.commit(organization, changes).await?;

        info!(
            organization_id = %organization,
            sale_id = %sale.id_typed(),
            invoices = sale.invoices().len(),
            "sale registered"
        );
        Ok(sale)
    }

    pub async fn get_sale(&self, organization: OrganizationId, id: SaleId) -> ServiceResult<Sale> {
        Ok(self.load::<Sale>(organization, id.aggregate_id()).await?.document)
    }

    pub async fn list_sales(&self, organization: OrganizationId) -> ServiceResult<Vec<Sale>> {
        let mut sales: Vec<Sale> = fetch_all(&self.store, organization).await?;
        sales.sort_by_key(|s| std::cmp::Reverse(s.created_at()));
        Ok(sales)
    }
}
