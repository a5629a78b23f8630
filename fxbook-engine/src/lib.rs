//! FIFO lot accounting engine.
//!
//! Purchases create lots, sales consume them oldest first, deletions append
//! compensating entries, and reconciliation proves that foreign cash equals
//! remaining inventory. [`FxBook`] is the facade the host application talks
//! to; the component modules are public for callers that compose their own
//! transactions.

mod adjustment;
pub mod allocator;
mod cash;
mod context;
mod error;
pub mod lots;
mod purchase;
pub mod reconcile;
pub mod records;
pub mod reversal;
mod service;
mod settlement;
pub mod store;

pub use adjustment::AdjustmentResult;
pub use allocator::{plan_fifo, AllocationResult, FifoAllocator, PlannedSlice, SaleRequest};
pub use context::BookContext;
pub use error::{EngineError, EngineResult};
pub use lots::{InventorySummary, LotStore};
pub use purchase::{PurchaseRequest, PurchaseResult};
pub use reconcile::{
    AccountContribution, AccountCorrection, ConservationViolation, DiscrepancyReport, LedgerDrift,
    LotContribution, ReconciliationChecker, RepairReport,
};
pub use reversal::{ReversalCoordinator, ReversalResult};
pub use service::{FxBook, DESK_HOLDER};
pub use settlement::SettlementResult;
pub use store::SqliteStore;
