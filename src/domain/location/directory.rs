//! Location directory interface

use async_trait::async_trait;

use super::model::{Location, LocationId};
use crate::shared::DomainResult;

#[async_trait]
pub trait LocationDirectory: Send + Sync {
    /// All locations currently accepting orders
    async fn list_active_locations(&self) -> DomainResult<Vec<Location>>;

    /// Find a location by ID regardless of its active flag
    async fn find_by_id(&self, id: &LocationId) -> DomainResult<Option<Location>>;
}
