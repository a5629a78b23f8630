//! Domain types shared by the fxbook ledger and allocation engine.

mod account;
mod currency;
mod ids;
mod lot;
pub mod money;
mod records;

pub use account::{AccountKind, CashAccount, NewAccount};
pub use currency::Currency;
pub use ids::{AccountId, AllocationId, HolderId, LotId, PurchaseId, SaleId};
pub use lot::{Allocation, AllocationStatus, Lot};
pub use records::{Purchase, PurchaseStatus, Sale, SaleStatus};
