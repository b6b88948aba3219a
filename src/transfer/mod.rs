//! Transfer Engine
//!
//! Moves money between two accounts as one atomic unit of work.
//!
//! # Flow
//!
//! ```text
//! caller ──▶ TransferCoordinator::transfer
//!               └─▶ run_in_transaction ── begin
//!                     1. create transfer
//!                     2. create debit entry  (-amount on from)
//!                     3. create credit entry (+amount on to)
//!                     4. move_money: increment lower account id first
//!                   commit (or rollback on any failure)
//! ```
//!
//! # Safety Invariants
//!
//! 1. **All or nothing**: the transfer row, both entries and both balance
//!    changes commit together or not at all
//! 2. **Atomic increments**: balances change only through the store's
//!    add-and-return primitive, never read-modify-write
//! 3. **Lock order**: the account with the lower id is always locked first,
//!    so opposite-direction transfers cannot deadlock
//! 4. **No retries**: failures are returned to the caller unchanged

pub mod coordinator;
pub mod unit_of_work;
pub mod validation;

pub use coordinator::{TransferCoordinator, move_money};
pub use unit_of_work::{run_in_transaction, run_in_transaction_with_timeout};
pub use validation::{TransferRequest, validate_transfer};
