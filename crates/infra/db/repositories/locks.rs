use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{Connection, RunQueryDsl, delete, insert_into, prelude::*, update};
use std::{sync::Arc, time::Duration};

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::resource_locks},
};
use domain::repositories::locks::LockRepository;

pub struct LockPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl LockPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl LockRepository for LockPostgres {
    async fn try_acquire(&self, resource: &str, holder: &str, lease: Duration) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();
        let stale_before = now - chrono::Duration::from_std(lease)?;

        let acquired = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            // Leases older than `lease` belong to holders that died mid-attempt.
            delete(
                resource_locks::table
                    .filter(resource_locks::resource.eq(resource))
                    .filter(resource_locks::locked_at.lt(stale_before)),
            )
            .execute(conn)?;

            let inserted = insert_into(resource_locks::table)
                .values((
                    resource_locks::resource.eq(resource),
                    resource_locks::locked_by.eq(holder),
                    resource_locks::locked_at.eq(now),
                ))
                .on_conflict_do_nothing()
                .execute(conn)?;

            Ok(inserted == 1)
        })?;

        Ok(acquired)
    }

    async fn renew(&self, resource: &str, holder: &str) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(
            resource_locks::table
                .filter(resource_locks::resource.eq(resource))
                .filter(resource_locks::locked_by.eq(holder)),
        )
        .set(resource_locks::locked_at.eq(Utc::now()))
        .execute(&mut conn)?;

        Ok(updated == 1)
    }

    async fn release(&self, resource: &str, holder: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        delete(
            resource_locks::table
                .filter(resource_locks::resource.eq(resource))
                .filter(resource_locks::locked_by.eq(holder)),
        )
        .execute(&mut conn)?;

        Ok(())
    }
}
