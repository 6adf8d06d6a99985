use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::products::ProductEntity;

#[automock]
#[async_trait]
pub trait ProductRepository {
    async fn find_by_ids(&self, product_ids: Vec<Uuid>) -> Result<Vec<ProductEntity>>;
}
