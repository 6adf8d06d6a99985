use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::invoices::InvoiceEntity;

#[automock]
#[async_trait]
pub trait InvoiceRepository {
    async fn find_by_id(&self, invoice_id: Uuid) -> Result<Option<InvoiceEntity>>;
}
