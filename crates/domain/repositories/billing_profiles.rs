use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::billing_profiles::BillingProfileEntity;

#[automock]
#[async_trait]
pub trait BillingProfileRepository {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<BillingProfileEntity>>;

    /// Inserts or replaces the profile for its user.
    async fn save(&self, profile: &BillingProfileEntity) -> Result<()>;
}
