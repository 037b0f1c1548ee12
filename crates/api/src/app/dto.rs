//! Request DTOs.
//!
//! Bodies carry what the caller decides. Organization, document ids and
//! timestamps are filled in by the handlers.

use chrono::NaiveDate;
use serde::Deserialize;

use tradeflow_bookings::{BookingDetails, BookingLineRequest, DiscountApprovalLine};
use tradeflow_catalog::{BuyerId, ManufacturerId, Packaging, TransporterId};
use tradeflow_credit_notes::{CreditNoteLineRequest, SaleId, SaleInvoice};
use tradeflow_ledger::{Location, WarehouseId};
use tradeflow_orders::{OrderDetails, OrderId, OrderLineRequest};
use tradeflow_purchases::PurchaseLine;

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    #[serde(default)]
    pub material_description: String,
    pub packaging: Packaging,
    pub pack_size: u32,
    pub net_weight_grams: u32,
    pub gross_weight_grams: u32,
    pub gst_percent: u8,
    #[serde(default)]
    pub static_price: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateWarehouseRequest {
    pub name: String,
    pub location: Location,
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub warehouse_id: WarehouseId,
    pub manufacturer_id: ManufacturerId,
    pub lines: Vec<OrderLineRequest>,
    #[serde(default)]
    pub details: OrderDetails,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderDetailsRequest {
    pub details: OrderDetails,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub warehouse_id: WarehouseId,
    pub buyer_id: BuyerId,
    pub lines: Vec<BookingLineRequest>,
    #[serde(default)]
    pub details: BookingDetails,
}

#[derive(Debug, Deserialize)]
pub struct ApproveDiscountRequest {
    pub lines: Vec<DiscountApprovalLine>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BookingListQuery {
    pub buyer_id: Option<BuyerId>,
}

#[derive(Debug, Deserialize)]
pub struct RecordPurchaseRequest {
    pub warehouse_id: WarehouseId,
    pub order_id: OrderId,
    #[serde(default)]
    pub transporter_id: Option<TransporterId>,
    pub invoice_no: String,
    pub invoice_date: NaiveDate,
    pub lines: Vec<PurchaseLine>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterSaleRequest {
    pub warehouse_id: WarehouseId,
    pub buyer_id: BuyerId,
    pub invoices: Vec<SaleInvoice>,
}

#[derive(Debug, Deserialize)]
pub struct IssueCreditNoteRequest {
    pub sale_id: SaleId,
    #[serde(default)]
    pub transporter_id: Option<TransporterId>,
    #[serde(default)]
    pub invoice_date: Option<NaiveDate>,
    pub lines: Vec<CreditNoteLineRequest>,
}
