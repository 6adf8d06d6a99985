//! Serialises work on a payment (or any other settlement resource) across
//! tasks in this process and across processes sharing the database.

use std::{
    collections::HashMap,
    fmt,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{Result, anyhow, bail};
use settlement::domain::repositories::locks::LockRepository;
use tokio::{sync::Mutex as AsyncMutex, time::Instant};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKey {
    Payment(Uuid),
    /// Keyed by user id; guards the saved-card list.
    BillingProfile(Uuid),
    Subscription(Uuid),
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::Payment(id) => write!(f, "payment:{id}"),
            LockKey::BillingProfile(user_id) => write!(f, "billing_profile:{user_id}"),
            LockKey::Subscription(id) => write!(f, "subscription:{id}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LockSettings {
    /// Age after which another process may steal an unreleased lease.
    pub lease: Duration,
    pub wait_timeout: Duration,
    pub retry_interval: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(60),
            wait_timeout: Duration::from_secs(10),
            retry_interval: Duration::from_millis(100),
        }
    }
}

pub struct PaymentStateGuard<L>
where
    L: LockRepository + Send + Sync + 'static,
{
    lock_repo: Arc<L>,
    settings: LockSettings,
    holder_id: String,
    local: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl<L> PaymentStateGuard<L>
where
    L: LockRepository + Send + Sync + 'static,
{
    pub fn new(lock_repo: Arc<L>, settings: LockSettings) -> Self {
        Self {
            lock_repo,
            settings,
            holder_id: Uuid::new_v4().to_string(),
            local: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `f` while holding `key`. The lock is released whatever `f`
    /// returns. If this future is dropped mid-flight the lease row expires
    /// after `LockSettings::lease`.
    ///
    /// The lease is renewed every third of `LockSettings::lease` while `f`
    /// runs. Once it cannot be renewed `f` is dropped and an error returned,
    /// so work never continues after another holder could have taken over.
    pub async fn with_lock<T, F, Fut>(&self, key: LockKey, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let resource = key.to_string();
        let deadline = Instant::now() + self.settings.wait_timeout;

        let local = self.local_mutex(&resource);
        let local_guard = match tokio::time::timeout_at(deadline, Arc::clone(&local).lock_owned())
            .await
        {
            Ok(guard) => guard,
            Err(_) => {
                drop(local);
                self.forget_if_idle(&resource);
                bail!("timed out waiting for lock on {resource}");
            }
        };

        if let Err(err) = self.acquire_lease(&resource, deadline).await {
            drop(local_guard);
            drop(local);
            self.forget_if_idle(&resource);
            return Err(err);
        }

        debug!(%resource, holder = %self.holder_id, "lock: acquired");
        let output = tokio::select! {
            output = f() => Ok(output),
            lost = self.keep_lease_alive(&resource) => Err(lost),
        };

        if let Err(err) = self.lock_repo.release(&resource, &self.holder_id).await {
            warn!(
                %resource,
                holder = %self.holder_id,
                db_error = ?err,
                "lock: failed to release lease; it will expire"
            );
        }

        drop(local_guard);
        drop(local);
        self.forget_if_idle(&resource);
        debug!(%resource, "lock: released");

        output
    }

    /// Only returns once the lease is gone.
    async fn keep_lease_alive(&self, resource: &str) -> anyhow::Error {
        let lease = self.settings.lease;
        let interval = (lease / 3).max(Duration::from_millis(1));
        let mut confirmed_at = Instant::now();

        loop {
            tokio::time::sleep(interval).await;

            match self.lock_repo.renew(resource, &self.holder_id).await {
                Ok(true) => {
                    confirmed_at = Instant::now();
                }
                Ok(false) => {
                    warn!(%resource, holder = %self.holder_id, "lock: lease taken over");
                    return anyhow!("lost lease on {resource}");
                }
                Err(err) => {
                    warn!(
                        %resource,
                        holder = %self.holder_id,
                        db_error = ?err,
                        "lock: failed to renew lease"
                    );
                    if confirmed_at.elapsed() + interval >= lease {
                        return anyhow!("lost lease on {resource}");
                    }
                }
            }
        }
    }

    async fn acquire_lease(&self, resource: &str, deadline: Instant) -> Result<()> {
        loop {
            if self
                .lock_repo
                .try_acquire(resource, &self.holder_id, self.settings.lease)
                .await?
            {
                return Ok(());
            }

            if Instant::now() + self.settings.retry_interval >= deadline {
                warn!(%resource, "lock: lease held elsewhere past wait timeout");
                bail!("timed out waiting for lock on {resource}");
            }

            tokio::time::sleep(self.settings.retry_interval).await;
        }
    }

    fn local_mutex(&self, resource: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self
            .local
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(
            map.entry(resource.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    // Entries are only cloned under the map lock, so a count of one means
    // no task is holding or waiting on the mutex.
    fn forget_if_idle(&self, resource: &str) {
        let mut map = self
            .local
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if map
            .get(resource)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            map.remove(resource);
        }
    }

    #[cfg(test)]
    fn tracked_resources(&self) -> usize {
        self.local
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
