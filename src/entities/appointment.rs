//! Appointment entity - Upcoming doctor visits shown on the dashboard.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Appointment database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "appointments")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Officer the appointment is for
    pub user_id: i64,
    /// Doctor seen
    pub doctor_name: String,
    /// Doctor's specialization
    pub specialization: String,
    /// Where the appointment takes place
    pub location: String,
    /// Date and time of the appointment
    pub scheduled_at: DateTimeUtc,
}

/// `Appointment` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
