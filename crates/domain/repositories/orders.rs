use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::orders::OrderEntity;

#[automock]
#[async_trait]
pub trait OrderRepository {
    async fn find_by_invoice_id(&self, invoice_id: Uuid) -> Result<Vec<OrderEntity>>;

    async fn clear_redirect(&self, order_id: Uuid) -> Result<()>;
}
