//! Credit notes against aggregated sales.
//!
//! Issuing a credit note records the over-billed quantity as an obligation
//! (billed grows); settling it returns that quantity to the available pool.

pub mod credit_note;
pub mod sale;

pub use credit_note::{
    CreditNote, CreditNoteEvent, CreditNoteId, CreditNoteIssued, CreditNoteLine,
    CreditNoteLineRequest, CreditNoteSettled, CreditNoteStatus, IssueCreditNote,
};
pub use sale::{RegisterSale, Sale, SaleId, SaleInvoice, SaleLine};
