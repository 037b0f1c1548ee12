//! End-to-end tests of the ledger services against the in-memory store.
//!
//! Service → decide → apply postings → commit → bus
//!
//! Verifies:
//! - Bucket movements of every transaction type, and their reversal
//! - All-or-nothing application across lines
//! - Organization isolation
//! - Commit conflicts are retried from a fresh load

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;

use tradeflow_bookings::{
    ApproveDiscount, BookingDetails, BookingId, BookingLineRequest, CreateBooking, DiscountApprovalLine,
    DiscountStatus,
};
use tradeflow_catalog::{BuyerId, CreateItem, ItemId, ManufacturerId, Packaging, Pickup};
use tradeflow_core::{AggregateId, DomainError, ErrorKind, ExpectedVersion, OrganizationId};
use tradeflow_credit_notes::{
    CreditNoteId, CreditNoteLineRequest, IssueCreditNote, RegisterSale, SaleId, SaleInvoice, SaleLine,
};
use tradeflow_events::{EventBus, InMemoryEventBus};
use tradeflow_ledger::{
    Bucket, BucketKey, CreateWarehouse, EntityKind, HistoryQuery, Location, Warehouse, WarehouseId,
};
use tradeflow_orders::{OrderDetails, OrderId, OrderLineRequest, OrderStatus, PlaceOrder};
use tradeflow_purchases::{PurchaseId, PurchaseLine, RecordPurchase};

use crate::events::{LedgerEnvelope, LedgerEvent};
use crate::services::{LedgerService, ServiceError};
use crate::store::{
    ChangeSet, Collection, InMemoryLedgerStore, LedgerStore, StoreError, StoreResult, StoredDocument, fetch,
};

type Bus = Arc<InMemoryEventBus<LedgerEnvelope>>;
type Service = LedgerService<Arc<InMemoryLedgerStore>, Bus>;

struct Fixture {
    service: Service,
    store: Arc<InMemoryLedgerStore>,
    bus: Bus,
    org: OrganizationId,
    warehouse: WarehouseId,
    item: ItemId,
}

impl Fixture {
    async fn new() -> Self {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let store = Arc::new(InMemoryLedgerStore::new());
        let service = LedgerService::new(store.clone(), bus.clone());
        let org = OrganizationId::new();
        let warehouse = create_warehouse(&service, org).await;
        let item = create_item(&service, org).await;
        Self {
            service,
            store,
            bus,
            org,
            warehouse,
            item,
        }
    }

    fn key(&self, pickup: Pickup) -> BucketKey {
        BucketKey::new(self.item, pickup)
    }

    async fn warehouse(&self) -> Warehouse {
        self.service.get_warehouse(self.org, self.warehouse).await.unwrap()
    }

    async fn quantity(&self, bucket: Bucket, pickup: Pickup) -> i64 {
        self.warehouse().await.quantity(bucket, self.key(pickup))
    }

    async fn place_order(&self, lines: &[(Pickup, i64)]) -> Result<OrderId, ServiceError> {
        let order_id = OrderId::generate();
        self.service
            .place_order(PlaceOrder {
                organization: self.org,
                order_id,
                warehouse_id: self.warehouse,
                manufacturer_id: ManufacturerId::generate(),
                lines: lines
                    .iter()
                    .map(|(pickup, quantity)| OrderLineRequest {
                        item: self.item,
                        pickup: *pickup,
                        quantity: *quantity,
                    })
                    .collect(),
                details: OrderDetails::default(),
                occurred_at: Utc::now(),
            })
            .await
            .map(|_| order_id)
    }

    async fn purchase(&self, order_id: OrderId, pickup: Pickup, quantity: i64) -> Result<PurchaseId, ServiceError> {
        let purchase_id = PurchaseId::generate();
        self.service
            .record_purchase(RecordPurchase {
                organization: self.org,
                purchase_id,
                warehouse_id: self.warehouse,
                order_id,
                transporter_id: None,
                invoice_no: format!("INV-{quantity}"),
                invoice_date: NaiveDate::from_ymd_opt(2024, 7, 15).unwrap(),
                lines: vec![PurchaseLine {
                    item: self.item,
                    pickup,
                    quantity,
                }],
                occurred_at: Utc::now(),
            })
            .await
            .map(|_| purchase_id)
    }

    async fn book(&self, lines: &[(Pickup, i64, i64)]) -> Result<BookingId, ServiceError> {
        let booking_id = BookingId::generate();
        self.service
            .create_booking(CreateBooking {
                organization: self.org,
                booking_id,
                warehouse_id: self.warehouse,
                buyer_id: BuyerId::generate(),
                lines: lines
                    .iter()
                    .map(|(pickup, quantity, discount)| BookingLineRequest {
                        item: self.item,
                        pickup: *pickup,
                        quantity: *quantity,
                        discount: *discount,
                        taxable_amount: 0,
                    })
                    .collect(),
                details: BookingDetails::default(),
                occurred_at: Utc::now(),
            })
            .await
            .map(|_| booking_id)
    }

    async fn approve(&self, booking_id: BookingId, pickup: Pickup, discount: i64) -> Result<DiscountStatus, ServiceError> {
        self.service
            .approve_discount(ApproveDiscount {
                organization: self.org,
                booking_id,
                lines: vec![DiscountApprovalLine {
                    item: self.item,
                    pickup,
                    discount,
                    taxable_amount: 0,
                }],
                occurred_at: Utc::now(),
            })
            .await
            .map(|b| b.discount_status())
    }

    async fn register_sale(&self, pickup: Pickup, quantity: i64) -> SaleId {
        let sale_id = SaleId::generate();
        self.service
            .register_sale(RegisterSale {
                organization: self.org,
                sale_id,
                warehouse_id: self.warehouse,
                buyer_id: BuyerId::generate(),
                invoices: vec![SaleInvoice {
                    invoice_no: "S-1".to_string(),
                    invoice_date: NaiveDate::from_ymd_opt(2024, 7, 20).unwrap(),
                    lines: vec![SaleLine {
                        item: self.item,
                        pickup,
                        quantity,
                    }],
                }],
                occurred_at: Utc::now(),
            })
            .await
            .unwrap();
        sale_id
    }

    async fn issue_credit_note(&self, sale_id: SaleId, pickup: Pickup, confirmed: i64) -> Result<CreditNoteId, ServiceError> {
        let credit_note_id = CreditNoteId::generate();
        self.service
            .issue_credit_note(IssueCreditNote {
                organization: self.org,
                credit_note_id,
                sale_id,
                transporter_id: None,
                invoice_date: None,
                lines: vec![CreditNoteLineRequest {
                    item: self.item,
                    pickup,
                    confirmed_quantity: confirmed,
                    reason: Some("short delivery".to_string()),
                }],
                occurred_at: Utc::now(),
            })
            .await
            .map(|_| credit_note_id)
    }
}

async fn create_warehouse<S, B>(service: &LedgerService<S, B>, org: OrganizationId) -> WarehouseId
where
    S: LedgerStore,
    B: EventBus<LedgerEnvelope>,
{
    service
        .create_warehouse(CreateWarehouse {
            organization: org,
            warehouse_id: WarehouseId::generate(),
            name: "Siliguri Depot".to_string(),
            location: Location {
                state: "West Bengal".to_string(),
                city: "Siliguri".to_string(),
            },
            occurred_at: Utc::now(),
        })
        .await
        .unwrap()
        .id_typed()
}

async fn create_item<S, B>(service: &LedgerService<S, B>, org: OrganizationId) -> ItemId
where
    S: LedgerStore,
    B: EventBus<LedgerEnvelope>,
{
    service
        .create_item(CreateItem {
            organization: org,
            item_id: ItemId::generate(),
            name: "Refined Soybean Oil".to_string(),
            material_description: String::new(),
            packaging: Packaging::Tin,
            pack_size: 1,
            net_weight_grams: 15_000,
            gross_weight_grams: 15_750,
            gst_percent: 5,
            static_price: None,
            occurred_at: Utc::now(),
        })
        .await
        .unwrap()
        .id
}

fn domain(err: ServiceError) -> DomainError {
    match err {
        ServiceError::Domain(e) => e,
        other => panic!("expected a domain error, got {other:?}"),
    }
}

#[tokio::test]
async fn order_then_full_purchase_moves_available_to_billed() {
    let f = Fixture::new().await;

    let order_id = f.place_order(&[(Pickup::Rack, 100)]).await.unwrap();
    assert_eq!(f.quantity(Bucket::Available, Pickup::Rack).await, 100);

    f.purchase(order_id, Pickup::Rack, 100).await.unwrap();
    assert_eq!(f.quantity(Bucket::Available, Pickup::Rack).await, 0);
    assert_eq!(f.quantity(Bucket::Billed, Pickup::Rack).await, 100);

    let order = f.service.get_order(f.org, order_id).await.unwrap();
    assert_eq!(order.status(), OrderStatus::Billed);
}

#[tokio::test]
async fn partial_purchase_leaves_order_partially_paid() {
    let f = Fixture::new().await;

    let order_id = f.place_order(&[(Pickup::Rack, 100)]).await.unwrap();
    f.purchase(order_id, Pickup::Rack, 40).await.unwrap();

    assert_eq!(f.quantity(Bucket::Available, Pickup::Rack).await, 60);
    assert_eq!(f.quantity(Bucket::Billed, Pickup::Rack).await, 40);
    let order = f.service.get_order(f.org, order_id).await.unwrap();
    assert_eq!(order.status(), OrderStatus::PartiallyPaid);
}

#[tokio::test]
async fn purchase_beyond_ordered_quantity_is_rejected_without_effect() {
    let f = Fixture::new().await;

    let order_id = f
        .place_order(&[(Pickup::Rack, 100), (Pickup::Depot, 10)])
        .await
        .unwrap();
    f.purchase(order_id, Pickup::Rack, 100).await.unwrap();
    let before = f.warehouse().await;

    let err = domain(f.purchase(order_id, Pickup::Rack, 1).await.unwrap_err());
    assert!(matches!(err.root(), DomainError::OverPurchase { .. }));
    assert_eq!(err.line(), Some(0));
    assert_eq!(f.warehouse().await, before);
}

#[tokio::test]
async fn billed_order_rejects_further_purchases() {
    let f = Fixture::new().await;

    let order_id = f.place_order(&[(Pickup::Plant, 5)]).await.unwrap();
    f.purchase(order_id, Pickup::Plant, 5).await.unwrap();
    let before = f.warehouse().await;

    let err = domain(f.purchase(order_id, Pickup::Plant, 1).await.unwrap_err());
    assert!(matches!(err, DomainError::OrderAlreadyBilled(_)));
    assert_eq!(err.kind(), ErrorKind::StateConflict);
    assert_eq!(f.warehouse().await, before);
}

#[tokio::test]
async fn zero_discount_booking_reserves_immediately() {
    let f = Fixture::new().await;
    f.place_order(&[(Pickup::Depot, 50)]).await.unwrap();

    f.book(&[(Pickup::Depot, 10, 0)]).await.unwrap();

    assert_eq!(f.quantity(Bucket::Available, Pickup::Depot).await, 40);
    assert_eq!(f.quantity(Bucket::Committed, Pickup::Depot).await, 10);
}

#[tokio::test]
async fn discounted_booking_waits_for_approval() {
    let f = Fixture::new().await;
    f.place_order(&[(Pickup::Depot, 50)]).await.unwrap();

    let booking_id = f.book(&[(Pickup::Depot, 10, 250)]).await.unwrap();
    assert_eq!(f.quantity(Bucket::Available, Pickup::Depot).await, 50);
    assert_eq!(f.quantity(Bucket::Committed, Pickup::Depot).await, 0);

    let status = f.approve(booking_id, Pickup::Depot, 200).await.unwrap();
    assert_eq!(status, DiscountStatus::Approved);
    assert_eq!(f.quantity(Bucket::Available, Pickup::Depot).await, 40);
    assert_eq!(f.quantity(Bucket::Committed, Pickup::Depot).await, 10);

    let err = domain(f.approve(booking_id, Pickup::Depot, 200).await.unwrap_err());
    assert!(matches!(err, DomainError::AlreadyApproved(_)));
    assert_eq!(f.quantity(Bucket::Committed, Pickup::Depot).await, 10);
}

#[tokio::test]
async fn deleting_a_booking_releases_its_reservation() {
    let f = Fixture::new().await;
    f.place_order(&[(Pickup::Rack, 30)]).await.unwrap();
    let booking_id = f.book(&[(Pickup::Rack, 30, 0)]).await.unwrap();

    f.service
        .delete_booking(f.org, booking_id, Utc::now())
        .await
        .unwrap();

    let warehouse = f.warehouse().await;
    assert_eq!(warehouse.quantity(Bucket::Available, f.key(Pickup::Rack)), 30);
    assert_eq!(warehouse.find_entry(Bucket::Committed, f.key(Pickup::Rack)), None);
    let err = domain(f.service.get_booking(f.org, booking_id).await.unwrap_err());
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn booking_cannot_be_deleted_once_its_committed_entry_is_short() {
    let f = Fixture::new().await;
    f.place_order(&[(Pickup::Rack, 30)]).await.unwrap();
    let booking_id = f.book(&[(Pickup::Rack, 10, 0)]).await.unwrap();

    // Another writer has already drawn 6 of the 10 committed units.
    let mut stored = fetch::<Warehouse, _>(&*f.store, f.org, f.warehouse.aggregate_id())
        .await
        .unwrap()
        .unwrap();
    stored.document.adjust(Bucket::Committed, f.key(Pickup::Rack), -6).unwrap();
    stored.document.mark_committed();
    let mut changes = ChangeSet::new();
    changes
        .put(&stored.document, ExpectedVersion::Exact(stored.revision))
        .unwrap();
    f.store.commit(f.org, changes).await.unwrap();
    let before = f.warehouse().await;

    let err = domain(
        f.service
            .delete_booking(f.org, booking_id, Utc::now())
            .await
            .unwrap_err(),
    );
    assert_eq!(err.kind(), ErrorKind::InsufficientQuantity);
    assert_eq!(err.line(), Some(0));

    let after = f.warehouse().await;
    assert_eq!(after, before);
    assert_eq!(after.quantity(Bucket::Available, f.key(Pickup::Rack)), 20);
    assert_eq!(after.quantity(Bucket::Committed, f.key(Pickup::Rack)), 4);
    assert!(f.service.get_booking(f.org, booking_id).await.is_ok());
}

#[tokio::test]
async fn booking_failure_on_a_later_line_changes_nothing() {
    let f = Fixture::new().await;
    f.place_order(&[(Pickup::Rack, 20), (Pickup::Depot, 5)]).await.unwrap();
    let before = f.warehouse().await;

    let err = domain(
        f.book(&[(Pickup::Rack, 10, 0), (Pickup::Depot, 6, 0)])
            .await
            .unwrap_err(),
    );
    assert_eq!(err.kind(), ErrorKind::InsufficientQuantity);
    assert_eq!(err.line(), Some(1));
    assert_eq!(f.warehouse().await, before);
    assert!(f.service.list_bookings(f.org, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn settling_a_credit_note_twice_is_rejected() {
    let f = Fixture::new().await;
    let order_id = f.place_order(&[(Pickup::Rack, 100)]).await.unwrap();
    f.purchase(order_id, Pickup::Rack, 100).await.unwrap();
    let sale_id = f.register_sale(Pickup::Rack, 60).await;

    let note_id = f.issue_credit_note(sale_id, Pickup::Rack, 45).await.unwrap();
    assert_eq!(f.quantity(Bucket::Billed, Pickup::Rack).await, 115);

    f.service.settle_credit_note(f.org, note_id, Utc::now()).await.unwrap();
    assert_eq!(f.quantity(Bucket::Billed, Pickup::Rack).await, 100);
    assert_eq!(f.quantity(Bucket::Available, Pickup::Rack).await, 15);

    let err = domain(
        f.service
            .settle_credit_note(f.org, note_id, Utc::now())
            .await
            .unwrap_err(),
    );
    assert!(matches!(err, DomainError::AlreadySettled(_)));
    assert_eq!(f.quantity(Bucket::Available, Pickup::Rack).await, 15);
}

#[tokio::test]
async fn deleting_a_purchase_recomputes_the_order() {
    let f = Fixture::new().await;
    let order_id = f.place_order(&[(Pickup::Rack, 100)]).await.unwrap();
    let first = f.purchase(order_id, Pickup::Rack, 40).await.unwrap();
    let second = f.purchase(order_id, Pickup::Rack, 60).await.unwrap();
    assert_eq!(
        f.service.get_order(f.org, order_id).await.unwrap().status(),
        OrderStatus::Billed
    );

    f.service.delete_purchase(f.org, second, Utc::now()).await.unwrap();
    let order = f.service.get_order(f.org, order_id).await.unwrap();
    assert_eq!(order.status(), OrderStatus::PartiallyPaid);
    assert_eq!(order.lines()[0].purchased_quantity, 40);
    assert_eq!(f.quantity(Bucket::Billed, Pickup::Rack).await, 40);
    assert_eq!(f.quantity(Bucket::Available, Pickup::Rack).await, 60);

    f.service.delete_purchase(f.org, first, Utc::now()).await.unwrap();
    let order = f.service.get_order(f.org, order_id).await.unwrap();
    assert_eq!(order.status(), OrderStatus::Created);
    assert_eq!(f.quantity(Bucket::Available, Pickup::Rack).await, 100);
}

#[tokio::test]
async fn order_with_purchases_cannot_be_deleted() {
    let f = Fixture::new().await;
    let order_id = f.place_order(&[(Pickup::Rack, 10)]).await.unwrap();
    f.purchase(order_id, Pickup::Rack, 1).await.unwrap();

    let err = domain(
        f.service
            .delete_order(f.org, order_id, Utc::now())
            .await
            .unwrap_err(),
    );
    assert_eq!(err.kind(), ErrorKind::StateConflict);
}

#[tokio::test]
async fn deleting_an_order_that_was_booked_against_fails_on_available() {
    let f = Fixture::new().await;
    let order_id = f.place_order(&[(Pickup::Rack, 10)]).await.unwrap();
    f.book(&[(Pickup::Rack, 8, 0)]).await.unwrap();

    let err = domain(
        f.service
            .delete_order(f.org, order_id, Utc::now())
            .await
            .unwrap_err(),
    );
    assert_eq!(err.kind(), ErrorKind::InsufficientQuantity);
    assert!(f.service.get_order(f.org, order_id).await.is_ok());
}

#[tokio::test]
async fn every_movement_is_recorded_in_history() {
    let f = Fixture::new().await;
    let order_id = f.place_order(&[(Pickup::Rack, 100)]).await.unwrap();
    f.purchase(order_id, Pickup::Rack, 40).await.unwrap();

    let all = f
        .service
        .list_history(f.org, &HistoryQuery::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    let billed = f
        .service
        .list_history(
            f.org,
            &HistoryQuery {
                bucket: Some(Bucket::Billed),
                ..HistoryQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(billed.len(), 1);
    assert_eq!(billed[0].quantity, 40);
    assert_eq!(billed[0].source.kind, EntityKind::Order);
    assert_eq!(billed[0].destination.kind, EntityKind::Warehouse);
}

#[tokio::test]
async fn rejected_transactions_leave_no_history() {
    let f = Fixture::new().await;
    let _ = f.book(&[(Pickup::Rack, 1, 0)]).await.unwrap_err();

    let history = f
        .service
        .list_history(f.org, &HistoryQuery::default())
        .await
        .unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn unknown_item_is_reported_against_its_line() {
    let f = Fixture::new().await;
    let err = domain(
        f.service
            .place_order(PlaceOrder {
                organization: f.org,
                order_id: OrderId::generate(),
                warehouse_id: f.warehouse,
                manufacturer_id: ManufacturerId::generate(),
                lines: vec![
                    OrderLineRequest {
                        item: f.item,
                        pickup: Pickup::Rack,
                        quantity: 1,
                    },
                    OrderLineRequest {
                        item: ItemId::generate(),
                        pickup: Pickup::Rack,
                        quantity: 1,
                    },
                ],
                details: OrderDetails::default(),
                occurred_at: Utc::now(),
            })
            .await
            .unwrap_err(),
    );
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.line(), Some(1));
}

#[tokio::test]
async fn other_organizations_cannot_see_or_touch_the_warehouse() {
    let f = Fixture::new().await;
    let intruder = OrganizationId::new();

    let err = domain(
        f.service
            .get_warehouse(intruder, f.warehouse)
            .await
            .unwrap_err(),
    );
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = domain(
        f.service
            .place_order(PlaceOrder {
                organization: intruder,
                order_id: OrderId::generate(),
                warehouse_id: f.warehouse,
                manufacturer_id: ManufacturerId::generate(),
                lines: vec![OrderLineRequest {
                    item: f.item,
                    pickup: Pickup::Rack,
                    quantity: 1,
                }],
                details: OrderDetails::default(),
                occurred_at: Utc::now(),
            })
            .await
            .unwrap_err(),
    );
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn committed_transactions_are_published() {
    let f = Fixture::new().await;
    let sub = f.bus.subscribe();

    let order_id = f.place_order(&[(Pickup::Rack, 10)]).await.unwrap();
    f.purchase(order_id, Pickup::Rack, 10).await.unwrap();
    let _ = f.purchase(order_id, Pickup::Rack, 1).await.unwrap_err();

    let placed = sub.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(placed.event_type(), "orders.order.placed");
    assert_eq!(placed.organization_id(), f.org);
    assert_eq!(placed.aggregate_id(), f.warehouse.aggregate_id());

    let recorded = sub.recv_timeout(Duration::from_secs(1)).unwrap();
    assert!(matches!(recorded.payload(), LedgerEvent::Purchase(_)));
    assert!(recorded.sequence_number() > placed.sequence_number());

    assert!(sub.try_recv().is_err());
}

/// Fails the first `conflicts` commits with a concurrency error.
struct ConflictingStore {
    inner: InMemoryLedgerStore,
    conflicts: AtomicU32,
}

#[async_trait::async_trait]
impl LedgerStore for ConflictingStore {
    async fn load(
        &self,
        organization: OrganizationId,
        collection: Collection,
        id: AggregateId,
    ) -> StoreResult<Option<StoredDocument>> {
        self.inner.load(organization, collection, id).await
    }

    async fn list(&self, organization: OrganizationId, collection: Collection) -> StoreResult<Vec<StoredDocument>> {
        self.inner.list(organization, collection).await
    }

    async fn history(
        &self,
        organization: OrganizationId,
        query: &HistoryQuery,
    ) -> StoreResult<Vec<tradeflow_ledger::HistoryRecord>> {
        self.inner.history(organization, query).await
    }

    async fn commit(&self, organization: OrganizationId, changes: ChangeSet) -> StoreResult<()> {
        let remaining = self.conflicts.load(Ordering::SeqCst);
        if remaining > 0 && changes.writes().len() > 1 {
            self.conflicts.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Concurrency("simulated concurrent writer".to_string()));
        }
        self.inner.commit(organization, changes).await
    }
}

async fn conflicting_service(conflicts: u32, retries: u32) -> (LedgerService<Arc<ConflictingStore>, Bus>, OrganizationId, WarehouseId, ItemId) {
    let store = Arc::new(ConflictingStore {
        inner: InMemoryLedgerStore::new(),
        conflicts: AtomicU32::new(conflicts),
    });
    let service = LedgerService::new(store, Arc::new(InMemoryEventBus::new())).with_commit_retries(retries);
    let org = OrganizationId::new();
    let warehouse = create_warehouse(&service, org).await;
    let item = create_item(&service, org).await;
    (service, org, warehouse, item)
}

fn order_cmd(org: OrganizationId, warehouse: WarehouseId, item: ItemId) -> PlaceOrder {
    PlaceOrder {
        organization: org,
        order_id: OrderId::generate(),
        warehouse_id: warehouse,
        manufacturer_id: ManufacturerId::generate(),
        lines: vec![OrderLineRequest {
            item,
            pickup: Pickup::Rack,
            quantity: 25,
        }],
        details: OrderDetails::default(),
        occurred_at: Utc::now(),
    }
}

#[tokio::test]
async fn commit_conflicts_are_retried() {
    let (service, org, warehouse, item) = conflicting_service(2, 3).await;

    service.place_order(order_cmd(org, warehouse, item)).await.unwrap();

    let w = service.get_warehouse(org, warehouse).await.unwrap();
    assert_eq!(w.quantity(Bucket::Available, BucketKey::new(item, Pickup::Rack)), 25);
}

#[tokio::test]
async fn exhausted_retries_surface_the_conflict() {
    let (service, org, warehouse, item) = conflicting_service(5, 1).await;

    let err = service.place_order(order_cmd(org, warehouse, item)).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Concurrency));

    let w = service.get_warehouse(org, warehouse).await.unwrap();
    assert!(w.bucket(Bucket::Available).is_empty());
}

#[tokio::test]
async fn concurrent_bookings_on_one_warehouse_never_oversell() {
    let f = Arc::new(Fixture::new().await);
    f.place_order(&[(Pickup::Rack, 10)]).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let f = f.clone();
        tasks.push(tokio::spawn(async move { f.book(&[(Pickup::Rack, 3, 0)]).await.is_ok() }));
    }
    let mut succeeded = 0;
    for task in tasks {
        if task.await.unwrap() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 3);
    assert_eq!(f.quantity(Bucket::Available, Pickup::Rack).await, 1);
    assert_eq!(f.quantity(Bucket::Committed, Pickup::Rack).await, 9);
}

#[derive(Debug, Clone)]
enum Op {
    Order(i64),
    Purchase(usize, i64),
    Book(i64, bool),
    Approve(usize),
    DeleteBooking(usize),
    DeletePurchase(usize),
    DeleteOrder(usize),
    Credit(i64),
    Settle(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i64..60).prop_map(Op::Order),
        (0usize..8, 1i64..60).prop_map(|(i, q)| Op::Purchase(i, q)),
        (1i64..40, any::<bool>()).prop_map(|(q, d)| Op::Book(q, d)),
        (0usize..8).prop_map(Op::Approve),
        (0usize..8).prop_map(Op::DeleteBooking),
        (0usize..8).prop_map(Op::DeletePurchase),
        (0usize..8).prop_map(Op::DeleteOrder),
        (0i64..80).prop_map(Op::Credit),
        (0usize..8).prop_map(Op::Settle),
    ]
}

fn pick<T: Copy>(ids: &[T], i: usize) -> Option<T> {
    (!ids.is_empty()).then(|| ids[i % ids.len()])
}

async fn run_ops(ops: Vec<Op>) {
    let f = Fixture::new().await;
    let pickup = Pickup::Rack;
    let sale_id = f.register_sale(pickup, 60).await;
    let (mut orders, mut bookings, mut purchases, mut notes) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());

    for op in ops {
        let before = f.warehouse().await;
        let result: Result<(), ServiceError> = match op {
            Op::Order(q) => f.place_order(&[(pickup, q)]).await.map(|id| orders.push(id)),
            Op::Purchase(i, q) => match pick(&orders, i) {
                Some(order) => f.purchase(order, pickup, q).await.map(|id| purchases.push(id)),
                None => Ok(()),
            },
            Op::Book(q, discounted) => f
                .book(&[(pickup, q, if discounted { 100 } else { 0 })])
                .await
                .map(|id| bookings.push(id)),
            Op::Approve(i) => match pick(&bookings, i) {
                Some(b) => f.approve(b, pickup, 100).await.map(|_| ()),
                None => Ok(()),
            },
            Op::DeleteBooking(i) => match pick(&bookings, i) {
                Some(b) => f.service.delete_booking(f.org, b, Utc::now()).await.map(|_| {
                    bookings.retain(|x| *x != b);
                }),
                None => Ok(()),
            },
            Op::DeletePurchase(i) => match pick(&purchases, i) {
                Some(p) => f.service.delete_purchase(f.org, p, Utc::now()).await.map(|_| {
                    purchases.retain(|x| *x != p);
                }),
                None => Ok(()),
            },
            Op::DeleteOrder(i) => match pick(&orders, i) {
                Some(o) => f.service.delete_order(f.org, o, Utc::now()).await.map(|_| {
                    orders.retain(|x| *x != o);
                }),
                None => Ok(()),
            },
            Op::Credit(confirmed) => f
                .issue_credit_note(sale_id, pickup, confirmed)
                .await
                .map(|id| notes.push(id)),
            Op::Settle(i) => match pick(&notes, i) {
                Some(n) => f.service.settle_credit_note(f.org, n, Utc::now()).await.map(|_| ()),
                None => Ok(()),
            },
        };

        let after = f.warehouse().await;
        assert!(after.is_consistent(), "negative bucket after {op:?}");
        if let Err(err) = result {
            assert!(matches!(err, ServiceError::Domain(_)), "unexpected {err:?}");
            assert_eq!(after, before, "failed {op:?} changed the warehouse");
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn buckets_stay_non_negative_under_any_transaction_sequence(ops in proptest::collection::vec(op(), 1..30)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run_ops(ops));
    }
}
