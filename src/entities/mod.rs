//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables used by the database store.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod appointment;
pub mod claim;
pub mod entitlement;

// Re-export specific types to avoid conflicts
pub use appointment::{
    Column as AppointmentColumn, Entity as Appointment, Model as AppointmentModel,
};
pub use claim::{Column as ClaimColumn, Entity as Claim, Model as ClaimModel};
pub use entitlement::{
    Column as EntitlementColumn, Entity as Entitlement, Model as EntitlementModel,
};
