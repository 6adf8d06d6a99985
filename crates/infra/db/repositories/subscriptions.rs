use anyhow::{Result, bail};
use async_trait::async_trait;
use diesel::{Connection, RunQueryDsl, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::subscriptions},
};
use domain::{
    entities::subscriptions::{SubscriptionChangeset, SubscriptionEntity, SubscriptionRow},
    repositories::subscriptions::SubscriptionRepository,
    value_objects::enums::subscription_statuses::SubscriptionStatus,
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn find_by_id(&self, subscription_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = subscriptions::table
            .find(subscription_id)
            .select(SubscriptionRow::as_select())
            .first::<SubscriptionRow>(&mut conn)
            .optional()?;

        row.map(SubscriptionEntity::try_from).transpose()
    }

    async fn find_by_order_ids(&self, order_ids: Vec<Uuid>) -> Result<Vec<SubscriptionEntity>> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = subscriptions::table
            .filter(subscriptions::order_id.eq_any(order_ids))
            .order(subscriptions::created_at.asc())
            .select(SubscriptionRow::as_select())
            .load::<SubscriptionRow>(&mut conn)?;

        rows.into_iter().map(SubscriptionEntity::try_from).collect()
    }

    async fn list_active_registered(&self) -> Result<Vec<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = subscriptions::table
            .filter(subscriptions::status.eq(SubscriptionStatus::Active.to_string()))
            .filter(subscriptions::provider_subscription_id.is_not_null())
            .order(subscriptions::updated_at.asc())
            .select(SubscriptionRow::as_select())
            .load::<SubscriptionRow>(&mut conn)?;

        rows.into_iter().map(SubscriptionEntity::try_from).collect()
    }

    async fn save(&self, subscription: &SubscriptionEntity) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let changes = SubscriptionChangeset::from(subscription);

        let updated = update(subscriptions::table.find(subscription.id))
            .set(&changes)
            .execute(&mut conn)?;

        if updated == 0 {
            bail!("subscription {} does not exist", subscription.id);
        }

        Ok(())
    }

    async fn save_all(&self, records: &[SubscriptionEntity]) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<_, anyhow::Error, _>(|conn| {
            for record in records {
                let updated = update(subscriptions::table.find(record.id))
                    .set(&SubscriptionChangeset::from(record))
                    .execute(conn)?;

                if updated == 0 {
                    bail!("subscription {} does not exist", record.id);
                }
            }

            Ok(())
        })
    }
}
