use std::{env, str::FromStr};

use anyhow::{Context, Result};
use settlement::domain::value_objects::money::DEFAULT_CURRENCY;

use super::config_model::{BackendServer, Database, DotEnvyConfig, Locking, Shop, Stripe};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: required("SERVER_PORT")?,
        body_limit: required("SERVER_BODY_LIMIT")?,
        timeout: required("SERVER_TIMEOUT")?,
    };

    let shop = Shop {
        domain: env::var("PUBLIC_DOMAIN").context("PUBLIC_DOMAIN is invalid")?,
        currency: env::var("SHOP_CURRENCY")
            .map(|currency| currency.trim().to_ascii_lowercase())
            .ok()
            .filter(|currency| !currency.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
    };

    Ok(DotEnvyConfig {
        backend_server,
        database: load_database()?,
        stripe: load_stripe()?,
        shop,
        locking: load_locking()?,
    })
}

pub fn load_database() -> Result<Database> {
    Ok(Database {
        url: env::var("DATABASE_URL").context("DATABASE_URL is invalid")?,
        max_connections: optional("DATABASE_MAX_CONNECTIONS", 10)?,
    })
}

pub fn load_stripe() -> Result<Stripe> {
    Ok(Stripe {
        secret_key: env::var("STRIPE_SECRET_KEY").context("STRIPE_SECRET_KEY is invalid")?,
        timeout_secs: optional("STRIPE_TIMEOUT_SECS", 30)?,
    })
}

pub fn load_locking() -> Result<Locking> {
    Ok(Locking {
        lease_secs: optional("LOCK_LEASE_SECS", 60)?,
        wait_ms: optional("LOCK_WAIT_MS", 10_000)?,
        retry_ms: optional("LOCK_RETRY_MS", 100)?,
    })
}

fn required<T>(name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(name)
        .with_context(|| format!("{name} is invalid"))?
        .trim()
        .parse()
        .with_context(|| format!("{name} is invalid"))
}

pub fn optional<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} is invalid")),
        _ => Ok(default),
    }
}
