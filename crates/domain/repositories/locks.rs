use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

/// Cross-process lease on a named resource.
#[automock]
#[async_trait]
pub trait LockRepository {
    /// Takes the lease unless another holder has one younger than `lease`.
    async fn try_acquire(&self, resource: &str, holder: &str, lease: Duration) -> Result<bool>;

    /// Pushes the lease start to now. Returns false when `holder` no longer
    /// owns the lease.
    async fn renew(&self, resource: &str, holder: &str) -> Result<bool>;

    async fn release(&self, resource: &str, holder: &str) -> Result<()>;
}
