use core::fmt;
use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tradeflow_catalog::{BuyerId, ItemCatalog, ItemId, Pickup};
use tradeflow_core::{
    AggregateRoot, DomainError, DomainResult, OrganizationId, aggregate_id, checked_total, saturating_total,
};
use tradeflow_events::Event;
use tradeflow_ledger::{Bucket, BucketKey, EntityRef, Posting, WarehouseId};

use crate::gate::{GateDecision, evaluate_gate};

aggregate_id!(
    /// A buyer booking.
    BookingId
);

/// Overall discount approval status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscountStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "partially approved")]
    PartiallyApproved,
    #[serde(rename = "approved")]
    Approved,
}

impl DiscountStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DiscountStatus::Pending => "pending",
            DiscountStatus::PartiallyApproved => "partially approved",
            DiscountStatus::Approved => "approved",
        }
    }
}

impl fmt::Display for DiscountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-line state of the discount gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineApproval {
    /// Created without a discount.
    NotRequired,
    /// Discounted and not yet approved.
    Pending,
    Approved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingLine {
    pub item: ItemId,
    pub pickup: Pickup,
    pub quantity: i64,
    /// Discount in minor currency units.
    pub discount: i64,
    pub taxable_amount: i64,
    pub approval: LineApproval,
    /// Whether `quantity` currently sits in the committed bucket for this booking.
    pub reserved: bool,
}

impl BookingLine {
    pub fn key(&self) -> BucketKey {
        BucketKey::new(self.item, self.pickup)
    }

    fn gate_clear(&self) -> bool {
        !matches!(self.approval, LineApproval::Pending)
    }
}

fn default_reminder_days() -> Vec<u32> {
    vec![7, 3, 1]
}

/// Commercial metadata; no ledger effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDetails {
    #[serde(default)]
    pub bargain_no: Option<String>,
    #[serde(default)]
    pub bargain_date: Option<NaiveDate>,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_reminder_days")]
    pub reminder_days: Vec<u32>,
    #[serde(default)]
    pub total_amount: i64,
}

impl Default for BookingDetails {
    fn default() -> Self {
        Self {
            bargain_no: None,
            bargain_date: None,
            delivery_address: None,
            description: None,
            reminder_days: default_reminder_days(),
            total_amount: 0,
        }
    }
}

/// Aggregate root: Booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    id: BookingId,
    organization: OrganizationId,
    warehouse_id: WarehouseId,
    buyer_id: BuyerId,
    lines: Vec<BookingLine>,
    discount_status: DiscountStatus,
    details: BookingDetails,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingLineRequest {
    pub item: ItemId,
    pub pickup: Pickup,
    pub quantity: i64,
    #[serde(default)]
    pub discount: i64,
    #[serde(default)]
    pub taxable_amount: i64,
}

/// Command: CreateBooking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBooking {
    pub organization: OrganizationId,
    pub booking_id: BookingId,
    pub warehouse_id: WarehouseId,
    pub buyer_id: BuyerId,
    pub lines: Vec<BookingLineRequest>,
    pub details: BookingDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountApprovalLine {
    pub item: ItemId,
    pub pickup: Pickup,
    pub discount: i64,
    #[serde(default)]
    pub taxable_amount: i64,
}

/// Command: ApproveDiscount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveDiscount {
    pub organization: OrganizationId,
    pub booking_id: BookingId,
    pub lines: Vec<DiscountApprovalLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BookingCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingCreated {
    pub organization: OrganizationId,
    pub booking_id: BookingId,
    pub warehouse_id: WarehouseId,
    pub buyer_id: BuyerId,
    pub discount_status: DiscountStatus,
    pub reserved_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DiscountApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountApproved {
    pub organization: OrganizationId,
    pub booking_id: BookingId,
    pub warehouse_id: WarehouseId,
    pub buyer_id: BuyerId,
    pub discount_status: DiscountStatus,
    pub reserved_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BookingRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRemoved {
    pub organization: OrganizationId,
    pub booking_id: BookingId,
    pub warehouse_id: WarehouseId,
    pub released_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingEvent {
    BookingCreated(BookingCreated),
    DiscountApproved(DiscountApproved),
    BookingRemoved(BookingRemoved),
}

impl Event for BookingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BookingEvent::BookingCreated(_) => "bookings.booking.created",
            BookingEvent::DiscountApproved(_) => "bookings.booking.discount_approved",
            BookingEvent::BookingRemoved(_) => "bookings.booking.removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BookingEvent::BookingCreated(e) => e.occurred_at,
            BookingEvent::DiscountApproved(e) => e.occurred_at,
            BookingEvent::BookingRemoved(e) => e.occurred_at,
        }
    }
}

impl Booking {
    /// Validate and create a booking.
    ///
    /// When the discount gate is clear every line is reserved immediately and
    /// the returned postings move its quantity from available to committed.
    /// Otherwise the booking waits in `pending` and no postings are returned.
    pub fn create<C>(
        cmd: CreateBooking,
        catalog: &C,
    ) -> DomainResult<(Self, Vec<Posting>, BookingEvent)>
    where
        C: ItemCatalog + ?Sized,
    {
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("a booking needs at least one line"));
        }

        let mut seen = BTreeSet::new();
        for (line, req) in cmd.lines.iter().enumerate() {
            validate_line(req).map_err(|e| e.at_line(line))?;
            catalog
                .get_item(cmd.organization, req.item)
                .map_err(|e| e.at_line(line))?;
            if !seen.insert(BucketKey::new(req.item, req.pickup)) {
                return Err(DomainError::validation(format!(
                    "item {} at {} appears on more than one line",
                    req.item, req.pickup
                ))
                .at_line(line));
            }
        }
        checked_total(cmd.lines.iter().map(|l| l.quantity))?;
        if cmd.details.reminder_days.iter().any(|d| *d == 0) {
            return Err(DomainError::validation("reminder days must be positive"));
        }

        let decision = evaluate_gate(cmd.lines.iter().map(|l| l.discount));
        let lines = cmd
            .lines
            .into_iter()
            .map(|req| BookingLine {
                item: req.item,
                pickup: req.pickup,
                quantity: req.quantity,
                discount: req.discount,
                taxable_amount: req.taxable_amount,
                approval: if req.discount == 0 {
                    LineApproval::NotRequired
                } else {
                    LineApproval::Pending
                },
                reserved: false,
            })
            .collect();

        let mut booking = Self {
            id: cmd.booking_id,
            organization: cmd.organization,
            warehouse_id: cmd.warehouse_id,
            buyer_id: cmd.buyer_id,
            lines,
            discount_status: DiscountStatus::Pending,
            details: cmd.details,
            version: 0,
            created_at: cmd.occurred_at,
            updated_at: cmd.occurred_at,
        };

        let postings = match decision {
            GateDecision::Clear => {
                booking.discount_status = DiscountStatus::Approved;
                booking.reserve_cleared_lines()
            }
            GateDecision::AwaitingApproval => Vec::new(),
        };

        let event = BookingEvent::BookingCreated(BookingCreated {
            organization: booking.organization,
            booking_id: booking.id,
            warehouse_id: booking.warehouse_id,
            buyer_id: booking.buyer_id,
            discount_status: booking.discount_status,
            reserved_quantity: booking.reserved_quantity(),
            occurred_at: booking.created_at,
        });
        Ok((booking, postings, event))
    }

    pub fn id_typed(&self) -> BookingId {
        self.id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn buyer_id(&self) -> BuyerId {
        self.buyer_id
    }

    pub fn lines(&self) -> &[BookingLine] {
        &self.lines
    }

    pub fn discount_status(&self) -> DiscountStatus {
        self.discount_status
    }

    pub fn details(&self) -> &BookingDetails {
        &self.details
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Total quantity currently held in committed for this booking.
    pub fn reserved_quantity(&self) -> i64 {
        saturating_total(self.lines.iter().filter(|l| l.reserved).map(|l| l.quantity))
    }

    /// Single-shot discount approval.
    ///
    /// Matched lines take the approved discount and, together with lines that
    /// never needed approval, are reserved. On error the booking is unchanged.
    ///
    /// A pending line missing from `cmd` is never reserved: later approvals
    /// fail with `AlreadyApproved`, so the booking stays `partially approved`
    /// until it is deleted and booked again.
    pub fn approve_discount(
        &mut self,
        cmd: ApproveDiscount,
    ) -> DomainResult<(Vec<Posting>, BookingEvent)> {
        self.ensure_organization(cmd.organization)?;
        if cmd.booking_id != self.id {
            return Err(DomainError::invariant("booking_id mismatch"));
        }
        if self.discount_status != DiscountStatus::Pending {
            return Err(DomainError::AlreadyApproved(self.id.to_string()));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation(
                "discount approval needs at least one line",
            ));
        }

        let mut working = self.clone();
        let mut every_discount_non_zero = true;
        for (index, req) in cmd.lines.iter().enumerate() {
            if req.discount < 0 || req.taxable_amount < 0 {
                return Err(DomainError::validation(
                    "discount and taxable amount cannot be negative",
                )
                .at_line(index));
            }
            let key = BucketKey::new(req.item, req.pickup);
            let line = working
                .lines
                .iter_mut()
                .find(|l| l.key() == key)
                .ok_or_else(|| {
                    DomainError::not_found("booking line", format!("{} {key}", self.id))
                        .at_line(index)
                })?;
            line.discount = req.discount;
            line.taxable_amount = req.taxable_amount;
            line.approval = LineApproval::Approved;
            every_discount_non_zero &= req.discount != 0;
        }

        let postings = working.reserve_cleared_lines();
        let all_resolved = working.lines.iter().all(BookingLine::gate_clear);
        working.discount_status = if all_resolved && every_discount_non_zero {
            DiscountStatus::Approved
        } else {
            DiscountStatus::PartiallyApproved
        };
        working.version += 1;
        working.updated_at = cmd.occurred_at;

        let event = BookingEvent::DiscountApproved(DiscountApproved {
            organization: working.organization,
            booking_id: working.id,
            warehouse_id: working.warehouse_id,
            buyer_id: working.buyer_id,
            discount_status: working.discount_status,
            reserved_quantity: working.reserved_quantity(),
            occurred_at: cmd.occurred_at,
        });

        *self = working;
        Ok((postings, event))
    }

    /// Postings that release this booking's reservations.
    ///
    /// Only reserved lines are reversed; lines still behind the gate never
    /// touched inventory.
    pub fn removal_postings(&self) -> Vec<Posting> {
        let warehouse = EntityRef::warehouse(self.warehouse_id);
        let buyer = EntityRef::buyer(self.buyer_id);
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, l)| l.reserved)
            .flat_map(|(i, l)| {
                [
                    Posting::new(i, Bucket::Available, l.key(), l.quantity, buyer, warehouse),
                    Posting::new(i, Bucket::Committed, l.key(), -l.quantity, buyer, warehouse),
                ]
            })
            .collect()
    }

    pub fn removed_event(&self, occurred_at: DateTime<Utc>) -> BookingEvent {
        BookingEvent::BookingRemoved(BookingRemoved {
            organization: self.organization,
            booking_id: self.id,
            warehouse_id: self.warehouse_id,
            released_quantity: self.reserved_quantity(),
            occurred_at,
        })
    }

    /// Mark every unreserved line whose gate is clear as reserved and return
    /// the available→committed postings for them.
    fn reserve_cleared_lines(&mut self) -> Vec<Posting> {
        let warehouse = EntityRef::warehouse(self.warehouse_id);
        let buyer = EntityRef::buyer(self.buyer_id);
        let mut postings = Vec::new();
        for (i, line) in self.lines.iter_mut().enumerate() {
            if line.reserved || !line.gate_clear() {
                continue;
            }
            line.reserved = true;
            postings.push(Posting::new(
                i,
                Bucket::Available,
                line.key(),
                -line.quantity,
                warehouse,
                buyer,
            ));
            postings.push(Posting::new(
                i,
                Bucket::Committed,
                line.key(),
                line.quantity,
                warehouse,
                buyer,
            ));
        }
        postings
    }

    fn ensure_organization(&self, organization: OrganizationId) -> DomainResult<()> {
        if self.organization != organization {
            return Err(DomainError::not_found("booking", self.id));
        }
        Ok(())
    }
}

impl AggregateRoot for Booking {
    type Id = BookingId;

    fn id(&self) -> BookingId {
        self.id
    }

    fn organization(&self) -> OrganizationId {
        self.organization
    }

    fn version(&self) -> u64 {
        self.version
    }
}

fn validate_line(req: &BookingLineRequest) -> DomainResult<()> {
    if req.quantity <= 0 {
        return Err(DomainError::validation(format!(
            "quantity must be positive (got {})",
            req.quantity
        )));
    }
    if req.discount < 0 {
        return Err(DomainError::validation("discount cannot be negative"));
    }
    if req.taxable_amount < 0 {
        return Err(DomainError::validation("taxable amount cannot be negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradeflow_catalog::{CreateItem, InMemoryItemCatalog, Item, Packaging};
    use tradeflow_core::ErrorKind;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn test_item(organization: OrganizationId) -> Item {
        Item::create(CreateItem {
            organization,
            item_id: ItemId::generate(),
            name: "Groundnut Oil".to_string(),
            material_description: String::new(),
            packaging: Packaging::Box,
            pack_size: 10,
            net_weight_grams: 1_000,
            gross_weight_grams: 1_100,
            gst_percent: 5,
            static_price: Some(18_500),
            occurred_at: test_time(),
        })
        .unwrap()
    }

    struct Fixture {
        org: OrganizationId,
        a: Item,
        b: Item,
        catalog: InMemoryItemCatalog,
    }

    fn fixture() -> Fixture {
        let org = OrganizationId::new();
        let (a, b) = (test_item(org), test_item(org));
        let catalog = [a.clone(), b.clone()].into_iter().collect();
        Fixture { org, a, b, catalog }
    }

    fn req(item: &Item, pickup: Pickup, quantity: i64, discount: i64) -> BookingLineRequest {
        BookingLineRequest {
            item: item.id,
            pickup,
            quantity,
            discount,
            taxable_amount: quantity * 100,
        }
    }

    fn create_cmd(f: &Fixture, lines: Vec<BookingLineRequest>) -> CreateBooking {
        CreateBooking {
            organization: f.org,
            booking_id: BookingId::generate(),
            warehouse_id: WarehouseId::generate(),
            buyer_id: BuyerId::generate(),
            lines,
            details: BookingDetails::default(),
            occurred_at: test_time(),
        }
    }

    fn approval(f: &Fixture, booking: &Booking, lines: Vec<DiscountApprovalLine>) -> ApproveDiscount {
        ApproveDiscount {
            organization: f.org,
            booking_id: booking.id_typed(),
            lines,
            occurred_at: test_time(),
        }
    }

    fn approve_line(item: &Item, pickup: Pickup, discount: i64) -> DiscountApprovalLine {
        DiscountApprovalLine {
            item: item.id,
            pickup,
            discount,
            taxable_amount: 0,
        }
    }

    #[test]
    fn booking_whose_total_overflows_is_rejected() {
        let f = fixture();
        let huge = |item: &Item| BookingLineRequest {
            item: item.id,
            pickup: Pickup::Rack,
            quantity: i64::MAX,
            discount: 0,
            taxable_amount: 0,
        };
        let err = Booking::create(create_cmd(&f, vec![huge(&f.a), huge(&f.b)]), &f.catalog)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.line(), Some(1));
    }

    #[test]
    fn zero_discount_booking_reserves_immediately() {
        let f = fixture();
        let (booking, postings, event) =
            Booking::create(create_cmd(&f, vec![req(&f.a, Pickup::Depot, 10, 0)]), &f.catalog)
                .unwrap();

        assert_eq!(booking.discount_status(), DiscountStatus::Approved);
        assert!(booking.lines()[0].reserved);
        assert_eq!(postings.len(), 2);
        assert_eq!((postings[0].bucket, postings[0].delta), (Bucket::Available, -10));
        assert_eq!((postings[1].bucket, postings[1].delta), (Bucket::Committed, 10));
        assert_eq!(postings[0].destination, EntityRef::buyer(booking.buyer_id()));
        match event {
            BookingEvent::BookingCreated(e) => assert_eq!(e.reserved_quantity, 10),
            _ => panic!("Expected BookingCreated event"),
        }
    }

    #[test]
    fn discounted_booking_waits_without_postings() {
        let f = fixture();
        let (booking, postings, _) = Booking::create(
            create_cmd(
                &f,
                vec![req(&f.a, Pickup::Rack, 5, 0), req(&f.b, Pickup::Rack, 5, 250)],
            ),
            &f.catalog,
        )
        .unwrap();

        assert_eq!(booking.discount_status(), DiscountStatus::Pending);
        assert!(postings.is_empty());
        assert_eq!(booking.reserved_quantity(), 0);
        assert_eq!(booking.lines()[0].approval, LineApproval::NotRequired);
        assert_eq!(booking.lines()[1].approval, LineApproval::Pending);
        assert_eq!(booking.details().reminder_days, vec![7, 3, 1]);
    }

    #[test]
    fn full_approval_reserves_every_line() {
        let f = fixture();
        let (mut booking, _, _) = Booking::create(
            create_cmd(
                &f,
                vec![req(&f.a, Pickup::Rack, 5, 0), req(&f.b, Pickup::Plant, 8, 250)],
            ),
            &f.catalog,
        )
        .unwrap();

        let cmd = approval(&f, &booking, vec![approve_line(&f.b, Pickup::Plant, 200)]);
        let (postings, event) = booking.approve_discount(cmd).unwrap();

        assert_eq!(booking.discount_status(), DiscountStatus::Approved);
        assert_eq!(booking.lines()[1].discount, 200);
        assert!(booking.lines().iter().all(|l| l.reserved));
        assert_eq!(postings.len(), 4);
        assert_eq!(postings.iter().filter(|p| p.bucket == Bucket::Committed).map(|p| p.delta).sum::<i64>(), 13);
        assert!(matches!(event, BookingEvent::DiscountApproved(ref e) if e.reserved_quantity == 13));
    }

    #[test]
    fn approval_leaving_a_line_pending_is_partial() {
        let f = fixture();
        let (mut booking, _, _) = Booking::create(
            create_cmd(
                &f,
                vec![req(&f.a, Pickup::Rack, 5, 100), req(&f.b, Pickup::Rack, 5, 100)],
            ),
            &f.catalog,
        )
        .unwrap();

        let cmd = approval(&f, &booking, vec![approve_line(&f.a, Pickup::Rack, 100)]);
        let (postings, _) = booking.approve_discount(cmd).unwrap();

        assert_eq!(booking.discount_status(), DiscountStatus::PartiallyApproved);
        assert!(booking.lines()[0].reserved);
        assert!(!booking.lines()[1].reserved);
        assert_eq!(postings.len(), 2);
    }

    #[test]
    fn approval_with_zero_discount_is_partial() {
        let f = fixture();
        let (mut booking, _, _) = Booking::create(
            create_cmd(&f, vec![req(&f.a, Pickup::Rack, 5, 100)]),
            &f.catalog,
        )
        .unwrap();

        let cmd = approval(&f, &booking, vec![approve_line(&f.a, Pickup::Rack, 0)]);
        booking.approve_discount(cmd).unwrap();
        assert_eq!(booking.discount_status(), DiscountStatus::PartiallyApproved);
        assert!(booking.lines()[0].reserved);
    }

    #[test]
    fn approval_is_single_shot() {
        let f = fixture();
        let (mut booking, _, _) = Booking::create(
            create_cmd(
                &f,
                vec![req(&f.a, Pickup::Rack, 5, 100), req(&f.b, Pickup::Rack, 5, 100)],
            ),
            &f.catalog,
        )
        .unwrap();
        let first = approval(&f, &booking, vec![approve_line(&f.a, Pickup::Rack, 100)]);
        booking.approve_discount(first).unwrap();

        let second = approval(&f, &booking, vec![approve_line(&f.b, Pickup::Rack, 100)]);
        match booking.approve_discount(second).unwrap_err() {
            DomainError::AlreadyApproved(id) => assert_eq!(id, booking.id_typed().to_string()),
            other => panic!("Expected AlreadyApproved, got {other:?}"),
        }
        assert!(!booking.lines()[1].reserved);
        assert_eq!(booking.discount_status(), DiscountStatus::PartiallyApproved);
        assert!(booking.removal_postings().iter().all(|p| p.line == 0));
    }

    #[test]
    fn approval_of_unknown_line_changes_nothing() {
        let f = fixture();
        let (mut booking, _, _) = Booking::create(
            create_cmd(&f, vec![req(&f.a, Pickup::Rack, 5, 100)]),
            &f.catalog,
        )
        .unwrap();
        let before = booking.clone();

        let cmd = approval(
            &f,
            &booking,
            vec![approve_line(&f.a, Pickup::Rack, 90), approve_line(&f.a, Pickup::Depot, 90)],
        );
        let err = booking.approve_discount(cmd).unwrap_err();

        assert_eq!(err.line(), Some(1));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(booking, before);
    }

    #[test]
    fn removal_releases_only_reserved_lines() {
        let f = fixture();
        let (mut booking, _, _) = Booking::create(
            create_cmd(
                &f,
                vec![req(&f.a, Pickup::Rack, 4, 100), req(&f.b, Pickup::Rack, 6, 100)],
            ),
            &f.catalog,
        )
        .unwrap();
        assert!(booking.removal_postings().is_empty());

        let cmd = approval(&f, &booking, vec![approve_line(&f.b, Pickup::Rack, 50)]);
        booking.approve_discount(cmd).unwrap();

        let postings = booking.removal_postings();
        assert_eq!(postings.len(), 2);
        assert!(postings.iter().all(|p| p.line == 1));
        assert_eq!((postings[0].bucket, postings[0].delta), (Bucket::Available, 6));
        assert_eq!((postings[1].bucket, postings[1].delta), (Bucket::Committed, -6));
    }

    #[test]
    fn create_rejects_bad_lines() {
        let f = fixture();
        let negative = create_cmd(&f, vec![req(&f.a, Pickup::Rack, 5, -1)]);
        assert_eq!(Booking::create(negative, &f.catalog).unwrap_err().kind(), ErrorKind::Validation);

        let unknown = create_cmd(
            &f,
            vec![
                req(&f.a, Pickup::Rack, 5, 0),
                BookingLineRequest {
                    item: ItemId::generate(),
                    pickup: Pickup::Rack,
                    quantity: 1,
                    discount: 0,
                    taxable_amount: 0,
                },
            ],
        );
        let err = Booking::create(unknown, &f.catalog).unwrap_err();
        assert_eq!((err.line(), err.kind()), (Some(1), ErrorKind::NotFound));
    }

    #[test]
    fn discount_status_serializes_with_spaces() {
        assert_eq!(
            serde_json::to_string(&DiscountStatus::PartiallyApproved).unwrap(),
            "\"partially approved\""
        );
    }
}
