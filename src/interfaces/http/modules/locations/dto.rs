use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Location;

/// A cafeteria or pickup point
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LocationDto {
    /// Stable identifier, e.g. "MAIN 1"
    pub id: String,
    pub name: String,
    pub is_active: bool,
}

impl From<Location> for LocationDto {
    fn from(l: Location) -> Self {
        Self {
            id: l.id.0,
            name: l.name,
            is_active: l.is_active,
        }
    }
}
