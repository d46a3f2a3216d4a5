//! Core business logic - framework-agnostic ledger, claim, dashboard, and seeding
//! operations. Everything here talks to storage only through
//! [`LedgerStore`](crate::store::LedgerStore).

/// Claim submission, visibility, edits, review, and deletion
pub mod claim;
/// Dashboard aggregation
pub mod dashboard;
/// Entitlement ledger, the sole writer of entitlement usage
pub mod ledger;
/// Seeding entitlements and appointments from configuration
pub mod seed;

pub use dashboard::DashboardSnapshot;
pub use ledger::{Balance, Ledger, ReviewDecision};
