use chrono::{DateTime, Utc};
use tracing::info;

use tradeflow_bookings::{ApproveDiscount, Booking, BookingEvent, BookingId, CreateBooking};
use tradeflow_catalog::BuyerId;
use tradeflow_core::{ExpectedVersion, OrganizationId};
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
    /// Create a booking. Without discounts it reserves stock immediately;
    /// otherwise it waits for discount approval with no ledger effect.
    pub async fn create_booking(&self, cmd: CreateBooking) -> ServiceResult<Booking> {
        let organization = cmd.organization;
        let _guard = self.locks.acquire(organization, cmd.warehouse_id).await;

        let cmd = &cmd;
        let (booking, warehouse, event) = self
            .with_retries("create_booking", move || self.attempt_create_booking(cmd))
            .await?;

        info!(
            organization_id = %organization,
            warehouse_id = %booking.warehouse_id(),
            booking_id = %booking.id_typed(),
            discount_status = %booking.discount_status(),
            reserved = booking.reserved_quantity(),
            "booking created"
        );
        self.publish(organization, &warehouse, event);
        Ok(booking)
    }

    async fn attempt_create_booking(
        &self,
        cmd: &CreateBooking,
    ) -> ServiceResult<(Booking, Warehouse, BookingEvent)> {
        let organization = cmd.organization;
        let mut warehouse = self.load_warehouse(organization, cmd.warehouse_id).await?;
        let catalog = self
            .catalog_for(organization, cmd.lines.iter().map(|l| l.item).collect::<Vec<_>>())
            .await?;

        let (booking, postings, event) = Booking::create(cmd.clone(), &catalog)?;

        let mut changes = ChangeSet::new();
        if !postings.is_empty() {
            apply_postings(
                &mut warehouse.document,
                organization,
                &postings,
                cmd.occurred_at,
                &mut changes,
            )?;
            stage_warehouse(&mut changes, &mut warehouse)?;
        }
        changes.put(&booking, ExpectedVersion::Exact(0))?;
        self.store.commit(organization, changes).await?;

        Ok((booking, warehouse.document, event))
    }

    /// Single-shot discount approval; reserves every line whose gate clears.
    pub async fn approve_discount(&self, cmd: ApproveDiscount) -> ServiceResult<Booking> {
        let organization = cmd.organization;
        let warehouse_id = self.get_booking(organization, cmd.booking_id).await?.warehouse_id();
        let _guard = self.locks.acquire(organization, warehouse_id).await;

        let cmd = &cmd;
        let (booking, warehouse, event) = self
            .with_retries("approve_discount", move || async move {
                let mut loaded = self
                    .load::<Booking>(organization, cmd.booking_id.aggregate_id())
                    .await?;
                let mut warehouse = self
                    .load_warehouse(organization, loaded.document.warehouse_id())
                    .await?;

                let (postings, event) = loaded.document.approve_discount(cmd.clone())?;

                let mut changes = ChangeSet::new();
                apply_postings(
                    &mut warehouse.document,
                    organization,
                    &postings,
                    cmd.occurred_at,
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
            booking_id = %booking.id_typed(),
            discount_status = %booking.discount_status(),
            reserved = booking.reserved_quantity(),
            "booking discount approved"
        );
        self.publish(organization, &warehouse, event);
        Ok(booking)
    }

    /// Delete a booking, releasing whatever it reserved back to available.
    pub async fn delete_booking(
        &self,
        organization: OrganizationId,
        id: BookingId,
        occurred_at: DateTime<Utc>,
    ) -> ServiceResult<Booking> {
        let warehouse_id = self.get_booking(organization, id).await?.warehouse_id();
        let _guard = self.locks.acquire(organization, warehouse_id).await;

        let (booking, warehouse, event) = self
            .with_retries("delete_booking", move || async move {
                let loaded = self.load::<Booking>(organization, id.aggregate_id()).await?;
                let booking = loaded.document;
                let mut warehouse = self.load_warehouse(organization, booking.warehouse_id()).await?;

                let postings = booking.removal_postings();
                let mut changes = ChangeSet::new();
                if !postings.is_empty() {
                    apply_postings(
                        &mut warehouse.document,
                        organization,
                        &postings,
                        occurred_at,
                        &mut changes,
                    )?;
                    stage_warehouse(&mut changes, &mut warehouse)?;
                }
                changes.delete(&booking, ExpectedVersion::Exact(loaded.revision));
                self.store.commit(organization, changes).await?;

                let event = booking.removed_event(occurred_at);
                Ok((booking, warehouse.document, event))
            })
            .await?;

        info!(
            organization_id = %organization,
            warehouse_id = %warehouse.id_typed(),
            booking_id = %booking.id_typed(),
            released = booking.reserved_quantity(),
            "booking deleted"
        );
        self.publish(organization, &warehouse, event);
        Ok(booking)
    }

    pub async fn get_booking(
        &self,
        organization: OrganizationId,
        id: BookingId,
    ) -> ServiceResult<Booking> {
        Ok(self.load::<Booking>(organization, id.aggregate_id()).await?.document)
    }

    /// Bookings, newest first, optionally for one buyer.
    pub async fn list_bookings(
        &self,
        organization: OrganizationId,
        buyer: Option<BuyerId>,
    ) -> ServiceResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = fetch_all(&self.store, organization).await?;
        bookings.retain(|b| buyer.is_none_or(|id| id == b.buyer_id()));
        bookings.sort_by_key(|b| std::cmp::Reverse(b.created_at()));
        Ok(bookings)
    }
}
