use std::sync::Arc;

use anyhow::Result;
use backend::usecases::{payment_guard::PaymentStateGuard, subscriptions::SubscriptionUseCase};
use settlement::{
    infra::db::{
        postgres::postgres_connection,
        repositories::{locks::LockPostgres, subscriptions::SubscriptionPostgres},
    },
    payments::stripe_client::StripeClient,
};
use tracing::{error, info};
use worker::{config, services::reconcile_loop};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Worker exited with error: {:#}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    settlement::observability::init_observability("worker")?;

    let dotenvy_env = config::config_loader::load()?;
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        dotenvy_env.database.max_connections,
    )?;
    info!("Postgres connection has been established");

    let db_pool_arc = Arc::new(postgres_pool);

    let gateway = Arc::new(StripeClient::new(
        dotenvy_env.stripe.secret_key.clone(),
        dotenvy_env.stripe.timeout(),
    )?);
    let guard = Arc::new(PaymentStateGuard::new(
        Arc::new(LockPostgres::new(Arc::clone(&db_pool_arc))),
        dotenvy_env.locking.settings(),
    ));
    let usecase = Arc::new(SubscriptionUseCase::new(
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool_arc))),
        guard,
        gateway,
    ));

    let reconcile = tokio::spawn(reconcile_loop::run(
        usecase,
        dotenvy_env.reconcile.interval(),
    ));

    tokio::select! {
        result = reconcile => result??,
        _ = tokio::signal::ctrl_c() => info!("Received ctrl+C signal"),
    };

    Ok(())
}
