use anyhow::Result;
use backend::config::config_loader::{load_database, load_locking, load_stripe, optional};

use super::config_model::{DotEnvyConfig, Reconcile};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    Ok(DotEnvyConfig {
        database: load_database()?,
        stripe: load_stripe()?,
        locking: load_locking()?,
        reconcile: Reconcile {
            interval_secs: optional("RECONCILE_INTERVAL_SECS", 3600)?,
        },
    })
}
