//! Unified error type for the claims ledger.
//!
//! Variants are grouped by how a caller should react: input problems (4xx-style),
//! seeding/configuration bugs, concurrency conflicts, and infrastructure failures.

use thiserror::Error;

use crate::models::{Category, ClaimStatus};

/// Every failure the ledger, claims service, and stores can report.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input rejected before reaching the ledger
    #[error("Validation failed for {field}: {message}")]
    Validation {
        /// Name of the offending field
        field: &'static str,
        /// Human-readable reason
        message: String,
    },

    /// Amount that is zero, negative, or not a finite number
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// A claim category has no entitlement in the active fiscal year (seeding bug)
    #[error("No {category} entitlement configured for fiscal year {fiscal_year}")]
    Configuration {
        /// Category that could not be matched
        category: Category,
        /// Fiscal year that was searched
        fiscal_year: String,
    },

    /// Entitlement changed underneath a guarded update
    #[error("Concurrent update on entitlement {entitlement_id}, expected version {expected_version}")]
    Conflict {
        /// Entitlement being written
        entitlement_id: i64,
        /// Version the writer read before updating
        expected_version: i64,
    },

    /// Claim row changed between read and write
    #[error("Concurrent update on claim {id}, expected version {expected_version}")]
    ClaimConflict {
        /// Claim being written
        id: i64,
        /// Version the writer read before updating
        expected_version: i64,
    },

    /// Usage change would take `used_amount` below zero
    #[error("Usage of entitlement {entitlement_id} would become negative ({used_amount} {delta:+})")]
    NegativeUsage {
        /// Entitlement being written
        entitlement_id: i64,
        /// Usage before the change
        used_amount: f64,
        /// Rejected change
        delta: f64,
    },

    /// Entitlement id does not exist
    #[error("Entitlement not found: {id}")]
    EntitlementNotFound {
        /// Requested entitlement id
        id: i64,
    },

    /// An entitlement already exists for this category and fiscal year
    #[error("Entitlement for {category} already exists in fiscal year {fiscal_year}")]
    DuplicateEntitlement {
        /// Category of the duplicate
        category: Category,
        /// Fiscal year of the duplicate
        fiscal_year: String,
    },

    /// Claim id does not exist
    #[error("Claim not found: {id}")]
    ClaimNotFound {
        /// Requested claim id
        id: i64,
    },

    /// Caller's role or ownership does not permit the operation
    #[error("Forbidden: {reason}")]
    Forbidden {
        /// Why access was denied
        reason: String,
    },

    /// Claim is not in a state that allows the requested change
    #[error("Claim {id} is {status}, cannot {action}")]
    InvalidTransition {
        /// Claim id
        id: i64,
        /// Current status
        status: ClaimStatus,
        /// Attempted action
        action: &'static str,
    },

    /// Application settings could not be loaded
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// Underlying SeaORM failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true when the failure was caused by the caller's input or permissions
    /// rather than by the system (maps to a 4xx response in an HTTP layer).
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::InvalidAmount { .. }
                | Self::EntitlementNotFound { .. }
                | Self::DuplicateEntitlement { .. }
                | Self::ClaimNotFound { .. }
                | Self::Forbidden { .. }
                | Self::InvalidTransition { .. }
                | Self::Conflict { .. }
                | Self::ClaimConflict { .. }
                | Self::NegativeUsage { .. }
        )
    }

    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub(crate) fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(Error::InvalidAmount { amount: -1.0 }.is_client_error());
        assert!(Error::forbidden("officers cannot review").is_client_error());
        assert!(
            !Error::Configuration {
                category: Category::Chronic,
                fiscal_year: "2023-24".to_string(),
            }
            .is_client_error()
        );
        assert!(!Error::Database(sea_orm::DbErr::Custom("boom".to_string())).is_client_error());
        assert!(
            Error::ClaimConflict {
                id: 3,
                expected_version: 1,
            }
            .is_client_error()
        );
    }

    #[test]
    fn test_negative_usage_message() {
        let err = Error::NegativeUsage {
            entitlement_id: 2,
            used_amount: 100.0,
            delta: -150.0,
        };
        assert_eq!(
            err.to_string(),
            "Usage of entitlement 2 would become negative (100 -150)"
        );
    }

    #[test]
    fn test_configuration_message_names_category() {
        let err = Error::Configuration {
            category: Category::Hospitalization,
            fiscal_year: "2023-24".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No hospitalization entitlement configured for fiscal year 2023-24"
        );
    }
}
