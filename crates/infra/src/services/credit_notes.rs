use chrono::{DateTime, Utc};
use tracing::info;

use tradeflow_core::{ExpectedVersion, OrganizationId};
use tradeflow_credit_notes::{CreditNote, CreditNoteEvent, CreditNoteId, IssueCreditNote, Sale};
use tradeflow_events::EventBus;
use tradeflow_ledger::{Warehouse, apply_postings};

use super::{LedgerService, ServiceResult, stage_warehouse};
use crate::events::LedgerEnvelope;
use crate::store::{ChangeSet, LedgerStore, fetch_all};

impl<S, B> LedgerService<S, B>
where
    S: LedgerStore,
    B: EventBus<LedgerEnvelope>,
{
    /// Issue a credit note for the over-billed part of a sale. Billed grows
    /// by the credited quantity until the note is settled.
    pub async fn issue_credit_note(&self, cmd: IssueCreditNote) -> ServiceResult<CreditNote> {
        let organization = cmd.organization;
        let warehouse_id = self.get_sale(organization, cmd.sale_id).await?.warehouse_id();
        let _guard = self.locks.acquire(organization, warehouse_id).await;

        let cmd = &cmd;
        let (note, warehouse, event) = self
            .with_retries("issue_credit_note", move || self.attempt_issue_credit_note(cmd))
            .await?;

        info!(
            organization_id = %organization,
            warehouse_id = %note.warehouse_id(),
            credit_note_id = %note.id_typed(),
            number = note.number(),
            quantity = note.total_quantity(),
            "credit note issued"
        );
        self.publish(organization, &warehouse, event);
        Ok(note)
    }

    async fn attempt_issue_credit_note(
        &self,
        cmd: &IssueCreditNote,
    ) -> ServiceResult<(CreditNote, Warehouse, CreditNoteEvent)> {
        let organization = cmd.organization;
        let sale = self
            .load::<Sale>(organization, cmd.sale_id.aggregate_id())
            .await?
            .document;
        let mut warehouse = self.load_warehouse(organization, sale.warehouse_id()).await?;

        let (note, postings, event) = CreditNote::issue(cmd.clone(), &sale)?;

        let mut changes = ChangeSet::new();
        apply_postings(
            &mut warehouse.document,
            organization,
            &postings,
            cmd.occurred_at,
            &mut changes,
        )?;
        stage_warehouse(&mut changes, &mut warehouse)?;
        changes.put(&note, ExpectedVersion::Exact(0))?;
        self.store.commit(organization, changes).await?;

        Ok((note, warehouse.document, event))
    }

    /// Settle a credit note: its quantity moves from billed back to available.
    /// A note settles exactly once.
    pub async fn settle_credit_note(
        &self,
        organization: OrganizationId,
        id: CreditNoteId,
        occurred_at: DateTime<Utc>,
    ) -> ServiceResult<CreditNote> {
        let warehouse_id = self.get_credit_note(organization, id).await?.warehouse_id();
        let _guard = self.locks.acquire(organization, warehouse_id).await;

        let (note, warehouse, event) = self
            .with_retries("settle_credit_note", move || async move {
                let mut loaded = self.load::<CreditNote>(organization, id.aggregate_id()).await?;
                let mut warehouse = self
                    .load_warehouse(organization, loaded.document.warehouse_id())
                    .await?;

                let (postings, event) = loaded.document.settle(organization, occurred_at)?;

                let mut changes = ChangeSet::new();
                apply_postings(
                    &mut warehouse.document,
                    organization,
                    &postings,
                    occurred_at,
                    &mut changes,
                )?;
                stage_warehouse(&mut changes, &mut warehouse)?;
                changes.put(&loaded.document, ExpectedVersion::Exact(loaded.revision))?;
                self.store.commit(organization, changes).await?;

                Ok((loaded.document, warehouse.document, event))
            })
            .await?;

        info!(
            organization_id = %organization,
            warehouse_id = %warehouse.id_typed(),
            credit_note_id = %note.id_typed(),
            number = note.number(),
            "credit note settled"
        );
        self.publish(organization, &warehouse, event);
        Ok(note)
    }

    pub async fn get_credit_note(
        &self,
        organization: OrganizationId,
        id: CreditNoteId,
    ) -> ServiceResult<CreditNote> {
        Ok(self.load::<CreditNote>(organization, id.aggregate_id()).await?.document)
    }

    pub async fn list_credit_notes(
        &self,
        organization: OrganizationId,
    ) -> ServiceResult<Vec<CreditNote>> {
        let mut notes: Vec<CreditNote> = fetch_all(&self.store, organization).await?;
        notes.sort_by_key(|n| std::cmp::Reverse(n.created_at()));
        Ok(notes)
    }
}
