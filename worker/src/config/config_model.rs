use std::time::Duration;

use backend::config::config_model::{Database, Locking, Stripe};

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub database: Database,
    pub stripe: Stripe,
    pub locking: Locking,
    pub reconcile: Reconcile,
}

#[derive(Debug, Clone)]
pub struct Reconcile {
    pub interval_secs: u64,
}

impl Reconcile {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}
