//! SeaORM implementation of LocationDirectory

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};

use crate::domain::{Location, LocationDirectory, LocationId};
use crate::infrastructure::database::entities::location;
use crate::shared::DomainResult;

pub struct SeaOrmLocationDirectory {
    db: DatabaseConnection,
}

impl SeaOrmLocationDirectory {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert `locations` if the table is empty. Returns how many were written.
    pub async fn seed_if_empty(&self, locations: &[Location]) -> DomainResult<u64> {
        if locations.is_empty() || location::Entity::find().count(&self.db).await? > 0 {
            return Ok(0);
        }

        let now = Utc::now();
        let models = locations.iter().map(|l| location::ActiveModel {
            id: Set(l.id.as_str().to_string()),
            name: Set(l.name.clone()),
            is_active: Set(l.is_active),
            created_at: Set(now),
        });
        let inserted = location::Entity::insert_many(models)
            .exec_without_returning(&self.db)
            .await?;
        debug!("Seeded {} locations", inserted);
        Ok(inserted)
    }
}

fn model_to_domain(m: location::Model) -> Location {
    Location {
        id: LocationId::new(m.id),
        name: m.name,
        is_active: m.is_active,
    }
}

#[async_trait]
impl LocationDirectory for SeaOrmLocationDirectory {
    async fn list_active_locations(&self) -> DomainResult<Vec<Location>> {
        let models = location::Entity::find()
            .filter(location::Column::IsActive.eq(true))
            .order_by_asc(location::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn find_by_id(&self, id: &LocationId) -> DomainResult<Option<Location>> {
        let model = location::Entity::find_by_id(id.as_str().to_string())
            .one(&self.db)
            .await?;
        Ok(model.map(model_to_domain))
    }
}
