use std::sync::Arc;

use settlement::{
    domain::{
        entities::subscriptions::SubscriptionEntity,
        repositories::{locks::LockRepository, subscriptions::SubscriptionRepository},
        value_objects::{request_context::RequestContext, subscriptions::ReconcileReport},
    },
    payments::gateway::PaymentGateway,
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::usecases::payment_guard::{LockKey, PaymentStateGuard};

#[derive(Debug, Error)]
pub enum SubscriptionUseCaseError {
    #[error("subscription not found")]
    SubscriptionNotFound,
    #[error("subscription has no gateway subscription")]
    NotRegistered,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SubscriptionUseCaseError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            SubscriptionUseCaseError::SubscriptionNotFound => StatusCode::NOT_FOUND,
            SubscriptionUseCaseError::NotRegistered => StatusCode::CONFLICT,
            SubscriptionUseCaseError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, SubscriptionUseCaseError>;

pub struct SubscriptionUseCase<S, L, G>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    L: LockRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    subscription_repo: Arc<S>,
    guard: Arc<PaymentStateGuard<L>>,
    gateway: Arc<G>,
}

impl<S, L, G> SubscriptionUseCase<S, L, G>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    L: LockRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(subscription_repo: Arc<S>, guard: Arc<PaymentStateGuard<L>>, gateway: Arc<G>) -> Self {
        Self {
            subscription_repo,
            guard,
            gateway,
        }
    }

    /// Stops renewal at the end of the current period. Cancelling twice is a
    /// no-op and makes no gateway call. A signed-in caller can only cancel
    /// subscriptions they own.
    pub async fn cancel(
        &self,
        ctx: &RequestContext,
        subscription_id: Uuid,
    ) -> UseCaseResult<SubscriptionEntity> {
        self.guard
            .with_lock(LockKey::Subscription(subscription_id), || {
                self.cancel_locked(ctx, subscription_id)
            })
            .await?
    }

    async fn cancel_locked(
        &self,
        ctx: &RequestContext,
        subscription_id: Uuid,
    ) -> UseCaseResult<SubscriptionEntity> {
        let mut subscription = self.load(subscription_id).await?;

        if let (Some(user), Some(owner)) = (ctx.user(), subscription.user_id) {
            if user.id != owner {
                warn!(%subscription_id, user_id = %user.id, "subscriptions: cancel by non-owner refused");
                return Err(SubscriptionUseCaseError::SubscriptionNotFound);
            }
        }

        if subscription.is_cancelled() {
            info!(%subscription_id, "subscriptions: already cancelled");
            return Ok(subscription);
        }

        let snapshot = match subscription.provider_subscription_id.as_deref() {
            Some(provider_subscription_id) => {
                let cancelled = self
                    .gateway
                    .cancel_subscription_at_period_end(provider_subscription_id)
                    .await
                    .map_err(|err| {
                        error!(
                            %subscription_id,
                            %provider_subscription_id,
                            error = %err,
                            "subscriptions: gateway cancel failed"
                        );
                        SubscriptionUseCaseError::Internal(err)
                    })?;
                Some(cancelled.raw)
            }
            // Never reached the gateway; nothing to stop there.
            None => None,
        };

        subscription.cancel(snapshot);
        self.save(&subscription).await?;

        info!(%subscription_id, "subscriptions: cancelled at period end");
        Ok(subscription)
    }

    /// Pulls the gateway state and cancels locally when the gateway
    /// subscription is no longer active or will not renew.
    pub async fn reconcile(&self, subscription_id: Uuid) -> UseCaseResult<SubscriptionEntity> {
        self.guard
            .with_lock(LockKey::Subscription(subscription_id), || {
                self.reconcile_locked(subscription_id)
            })
            .await?
    }

    async fn reconcile_locked(&self, subscription_id: Uuid) -> UseCaseResult<SubscriptionEntity> {
        let mut subscription = self.load(subscription_id).await?;

        if subscription.is_cancelled() {
            return Ok(subscription);
        }

        let Some(provider_subscription_id) = subscription.provider_subscription_id.clone() else {
            return Err(SubscriptionUseCaseError::NotRegistered);
        };

        let remote = self
            .gateway
            .retrieve_subscription(&provider_subscription_id)
            .await
            .map_err(|err| {
                warn!(
                    %subscription_id,
                    %provider_subscription_id,
                    error = %err,
                    "subscriptions: gateway lookup failed"
                );
                SubscriptionUseCaseError::Internal(err)
            })?;

        if remote.is_live() {
            return Ok(subscription);
        }

        info!(
            %subscription_id,
            %provider_subscription_id,
            status = %remote.status,
            cancel_at_period_end = remote.cancel_at_period_end,
            "subscriptions: gateway subscription ended; cancelling locally"
        );
        subscription.cancel(Some(remote.raw));
        self.save(&subscription).await?;

        Ok(subscription)
    }

    /// Reconciles every active registered subscription. One failure does
    /// not stop the sweep.
    pub async fn reconcile_active_subscriptions(&self) -> UseCaseResult<ReconcileReport> {
        let subscriptions = self
            .subscription_repo
            .list_active_registered()
            .await
            .map_err(|err| {
                error!(db_error = ?err, "subscriptions: failed to list active subscriptions");
                SubscriptionUseCaseError::Internal(err)
            })?;

        let mut report = ReconcileReport::default();
        for subscription in subscriptions {
            report.checked += 1;
            match self.reconcile(subscription.id).await {
                Ok(updated) if updated.is_cancelled() => report.cancelled += 1,
                Ok(_) => {}
                Err(err) => {
                    report.failed += 1;
                    warn!(subscription_id = %subscription.id, error = %err, "subscriptions: reconcile failed");
                }
            }
        }

        info!(
            checked = report.checked,
            cancelled = report.cancelled,
            failed = report.failed,
            "subscriptions: reconcile sweep finished"
        );
        Ok(report)
    }

    async fn load(&self, subscription_id: Uuid) -> UseCaseResult<SubscriptionEntity> {
        self.subscription_repo
            .find_by_id(subscription_id)
            .await
            .map_err(|err| {
                error!(%subscription_id, db_error = ?err, "subscriptions: failed to load subscription");
                SubscriptionUseCaseError::Internal(err)
            })?
            .ok_or(SubscriptionUseCaseError::SubscriptionNotFound)
    }

    async fn save(&self, subscription: &SubscriptionEntity) -> UseCaseResult<()> {
        self.subscription_repo
            .save(subscription)
            .await
            .map_err(|err| {
                error!(subscription_id = %subscription.id, db_error = ?err, "subscriptions: failed to save subscription");
                SubscriptionUseCaseError::Internal(err)
            })
    }
}
