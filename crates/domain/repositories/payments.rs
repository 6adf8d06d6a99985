use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::payments::PaymentEntity;

#[automock]
#[async_trait]
pub trait PaymentRepository {
    async fn find_by_id(&self, payment_id: Uuid) -> Result<Option<PaymentEntity>>;

    async fn find_by_wallet_source_id(&self, source_id: &str) -> Result<Option<PaymentEntity>>;

    /// Persists attempt state. The payment row must already exist.
    async fn save(&self, payment: &PaymentEntity) -> Result<()>;
}
