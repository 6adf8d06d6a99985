use std::{sync::Arc, time::Duration};

use anyhow::Result;
use backend::usecases::subscriptions::SubscriptionUseCase;
use settlement::{
    domain::repositories::{locks::LockRepository, subscriptions::SubscriptionRepository},
    payments::gateway::PaymentGateway,
};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Sweeps active subscriptions against the gateway on a fixed interval.
/// A failed sweep is logged and retried on the next tick.
pub async fn run<S, L, G>(usecase: Arc<SubscriptionUseCase<S, L, G>>, interval: Duration) -> Result<()>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    L: LockRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    info!(interval_secs = interval.as_secs(), "reconcile: starting worker loop");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match usecase.reconcile_active_subscriptions().await {
            Ok(report) if report.failed > 0 => error!(
                checked = report.checked,
                cancelled = report.cancelled,
                failed = report.failed,
                "reconcile: sweep finished with failures"
            ),
            Ok(report) => info!(
                checked = report.checked,
                cancelled = report.cancelled,
                "reconcile: sweep finished"
            ),
            Err(e) => error!(error = %e, "reconcile: sweep failed"),
        }
    }
}
