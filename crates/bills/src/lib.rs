//! Bills domain module (event-sourced).
//!
//! A bill is an accumulating ledger of line items in one currency that stays
//! open until explicitly closed. This crate holds the business rules only
//! (no IO, no async, no clock reads); the runtime that serializes commands
//! against a bill lives in `tally-infra`.

pub mod bill;
pub mod money;

pub use bill::{
    AddLineItem, Bill, BillClosed, BillCommand, BillCreated, BillEvent, BillId, BillStatus,
    CloseBill, CreateBill, LineItem, LineItemAdded, validate_amount,
};
pub use money::{Currency, cents_to_amount, round2_cents};
