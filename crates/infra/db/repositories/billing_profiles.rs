use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, insert_into, prelude::*, upsert::excluded};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::billing_profiles},
};
use domain::{
    entities::billing_profiles::{BillingProfileEntity, BillingProfileRow},
    repositories::billing_profiles::BillingProfileRepository,
};

pub struct BillingProfilePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl BillingProfilePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl BillingProfileRepository for BillingProfilePostgres {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<BillingProfileEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = billing_profiles::table
            .filter(billing_profiles::user_id.eq(user_id))
            .select(BillingProfileRow::as_select())
            .first::<BillingProfileRow>(&mut conn)
            .optional()?;

        row.map(BillingProfileEntity::try_from).transpose()
    }

    async fn save(&self, profile: &BillingProfileEntity) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let row = BillingProfileRow::try_from(profile)?;

        insert_into(billing_profiles::table)
            .values(&row)
            .on_conflict(billing_profiles::user_id)
            .do_update()
            .set((
                billing_profiles::customer_ref.eq(excluded(billing_profiles::customer_ref)),
                billing_profiles::cards.eq(excluded(billing_profiles::cards)),
                billing_profiles::updated_at.eq(excluded(billing_profiles::updated_at)),
            ))
            .execute(&mut conn)?;

        Ok(())
    }
}
