//! Booking transaction: a buyer's reservation against available stock.
//!
//! A booking moves stock from available to committed, but only once its
//! discount gate is clear. Bookings created with any discounted line wait in
//! `pending` until a single-shot discount approval resolves them.

pub mod booking;
pub mod gate;

pub use booking::{
    ApproveDiscount, Booking, BookingCreated, BookingDetails, BookingEvent, BookingId, BookingLine,
    BookingLineRequest, BookingRemoved, CreateBooking, DiscountApprovalLine, DiscountApproved,
    DiscountStatus, LineApproval,
};
pub use gate::{GateDecision, evaluate_gate};
