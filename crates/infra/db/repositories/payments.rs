use anyhow::{Result, bail};
use async_trait::async_trait;
use diesel::{RunQueryDsl, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::payments},
};
use domain::{
    entities::payments::{PaymentChangeset, PaymentEntity, PaymentRow},
    repositories::payments::PaymentRepository,
};

pub struct PaymentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentRepository for PaymentPostgres {
    async fn find_by_id(&self, payment_id: Uuid) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = payments::table
            .find(payment_id)
            .select(PaymentRow::as_select())
            .first::<PaymentRow>(&mut conn)
            .optional()?;

        row.map(PaymentEntity::try_from).transpose()
    }

    async fn find_by_wallet_source_id(&self, source_id: &str) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = payments::table
            .filter(payments::wallet_source_id.eq(source_id))
            .select(PaymentRow::as_select())
            .first::<PaymentRow>(&mut conn)
            .optional()?;

        row.map(PaymentEntity::try_from).transpose()
    }

    async fn save(&self, payment: &PaymentEntity) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let changes = PaymentChangeset::try_from(payment)?;

        let updated = update(payments::table.find(payment.id))
            .set(&changes)
            .execute(&mut conn)?;

        if updated == 0 {
            bail!("payment {} does not exist", payment.id);
        }

        Ok(())
    }
}
