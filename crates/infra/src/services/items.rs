use tracing::info;

use tradeflow_catalog::{CreateItem, Item, ItemId};
use tradeflow_core::{ExpectedVersion, OrganizationId};

use tradeflow_events::EventBus;

use super::{LedgerService, ServiceResult};
use crate::events::LedgerEnvelope;
use crate::store::{ChangeSet, LedgerStore, fetch_all};

impl<S, B> LedgerService<S, B>
where
    S: LedgerStore,
    B: EventBus<LedgerEnvelope>,
{
    pub async fn create_item(&self, cmd: CreateItem) -> ServiceResult<Item> {
        let organization = cmd.organization;
        let item = Item::create(cmd)?;

        let mut changes = ChangeSet::new();
        changes.put(&item, ExpectedVersion::Exact(0))?;
        self.store.commit(organization, changes).await?;

        info!(organization_id = %organization, item_id = %item.id, "item created");
        Ok(item)
    }

    /// Items are returned whether or not they are active.
    pub async fn get_item(&self, organization: OrganizationId, id: ItemId) -> ServiceResult<Item> {
        Ok(self.load::<Item>(organization, id.aggregate_id()).await?.document)
    }

    pub async fn list_items(&self, organization: OrganizationId) -> ServiceResult<Vec<Item>> {
        let mut items: Vec<Item> = fetch_all(&self.store, organization).await?;
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    /// Withdraw an item from new transactions.
    pub async fn deactivate_item(
        &self,
        organization: OrganizationId,
        id: ItemId,
    ) -> ServiceResult<Item> {
        self.with_retries("deactivate_item", || async {
            let mut loaded = self.load::<Item>(organization, id.aggregate_id()).await?;
            loaded.document.deactivate();

            let mut changes = ChangeSet::new();
            changes.put(&loaded.document, ExpectedVersion::Exact(loaded.revision))?;
            self.store.commit(organization, changes).await?;
            Ok(loaded.document)
        })
        .await
        .inspect(|item| info!(organization_id = %organization, item_id = %item.id, "item deactivated"))
    }
}
