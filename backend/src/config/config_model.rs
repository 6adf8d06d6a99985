use std::time::Duration;

use crate::usecases::payment_guard::LockSettings;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub stripe: Stripe,
    pub shop: Shop,
    pub locking: Locking,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub timeout_secs: u64,
}

impl Stripe {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl std::fmt::Debug for Stripe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stripe")
            .field("secret_key", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Shop {
    /// Public host name, used for wallet return URLs.
    pub domain: String,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct Locking {
    pub lease_secs: u64,
    pub wait_ms: u64,
    pub retry_ms: u64,
}

impl Locking {
    pub fn settings(&self) -> LockSettings {
        LockSettings {
            lease: Duration::from_secs(self.lease_secs),
            wait_timeout: Duration::from_millis(self.wait_ms),
            retry_interval: Duration::from_millis(self.retry_ms),
        }
    }
}
