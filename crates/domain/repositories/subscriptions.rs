use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::subscriptions::SubscriptionEntity;

#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    async fn find_by_id(&self, subscription_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    async fn find_by_order_ids(&self, order_ids: Vec<Uuid>) -> Result<Vec<SubscriptionEntity>>;

    /// Active subscriptions that hold a gateway subscription reference.
    async fn list_active_registered(&self) -> Result<Vec<SubscriptionEntity>>;

    async fn save(&self, subscription: &SubscriptionEntity) -> Result<()>;

    /// Saves every record or none of them.
    async fn save_all(&self, records: &[SubscriptionEntity]) -> Result<()>;
}
