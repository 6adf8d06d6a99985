use std::sync::Arc;

use settlement::domain::{
    entities::{billing_profiles::SanitisedBillingProfile, payments::PaymentEntity},
    repositories::{
        billing_profiles::BillingProfileRepository, locks::LockRepository,
        orders::OrderRepository, payments::PaymentRepository,
    },
    value_objects::{payment_methods::PaymentMethod, request_context::RequestContext},
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::usecases::{
    charge_orchestrator::ChargeAttempt,
    payment_guard::{LockKey, PaymentStateGuard},
};

#[derive(Debug, Error)]
pub enum PaymentUseCaseError {
    #[error("payment not found")]
    PaymentNotFound,
    #[error("no payment is waiting on this source")]
    UnknownSource,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PaymentUseCaseError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            PaymentUseCaseError::PaymentNotFound | PaymentUseCaseError::UnknownSource => {
                StatusCode::NOT_FOUND
            }
            PaymentUseCaseError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, PaymentUseCaseError>;

/// Where the customer lands after returning from a wallet provider.
#[derive(Debug, Clone)]
pub struct RedirectOutcome {
    pub payment: PaymentEntity,
    pub order_id: Option<Uuid>,
}

pub struct PaymentUseCase<P, O, B, L, C>
where
    P: PaymentRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    B: BillingProfileRepository + Send + Sync + 'static,
    L: LockRepository + Send + Sync + 'static,
    C: ChargeAttempt + 'static,
{
    payment_repo: Arc<P>,
    order_repo: Arc<O>,
    billing_repo: Arc<B>,
    guard: Arc<PaymentStateGuard<L>>,
    orchestrator: Arc<C>,
}

impl<P, O, B, L, C> PaymentUseCase<P, O, B, L, C>
where
    P: PaymentRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    B: BillingProfileRepository + Send + Sync + 'static,
    L: LockRepository + Send + Sync + 'static,
    C: ChargeAttempt + 'static,
{
    pub fn new(
        payment_repo: Arc<P>,
        order_repo: Arc<O>,
        billing_repo: Arc<B>,
        guard: Arc<PaymentStateGuard<L>>,
        orchestrator: Arc<C>,
    ) -> Self {
        Self {
            payment_repo,
            order_repo,
            billing_repo,
            guard,
            orchestrator,
        }
    }

    /// Runs one attempt under the payment lock. Concurrent callers for the
    /// same payment queue up and the later ones see the completed state.
    pub async fn process_payment_attempt(
        &self,
        ctx: &RequestContext,
        payment_id: Uuid,
        method: Option<PaymentMethod>,
    ) -> UseCaseResult<PaymentEntity> {
        self.guard
            .with_lock(LockKey::Payment(payment_id), || {
                self.attempt_locked(ctx, payment_id, method)
            })
            .await?
    }

    async fn attempt_locked(
        &self,
        ctx: &RequestContext,
        payment_id: Uuid,
        method: Option<PaymentMethod>,
    ) -> UseCaseResult<PaymentEntity> {
        let mut payment = self.load_payment(payment_id).await?;

        if payment.is_complete() {
            info!(%payment_id, "payments: already complete; skipping attempt");
            return Ok(payment);
        }

        if let Some(method) = method {
            info!(%payment_id, method = method.kind(), "payments: replacing payment method");
            payment.method = method;
        }

        let payment = self.orchestrator.attempt(ctx, payment).await.map_err(|err| {
            error!(%payment_id, error = ?err, "payments: attempt aborted");
            PaymentUseCaseError::Internal(err)
        })?;

        self.payment_repo.save(&payment).await.map_err(|err| {
            error!(
                %payment_id,
                complete = payment.is_complete(),
                db_error = ?err,
                "payments: failed to persist attempt outcome"
            );
            PaymentUseCaseError::Internal(err)
        })?;

        match payment.error() {
            Some(err) => warn!(%payment_id, kind = %err.kind, message = %err.message, "payments: attempt failed"),
            None => info!(%payment_id, complete = payment.is_complete(), "payments: attempt finished"),
        }

        Ok(payment)
    }

    /// Handles the customer returning from a wallet provider: charges the
    /// acknowledged source once and clears the order's pending redirect.
    pub async fn process_redirect_callback(&self, source_id: &str) -> UseCaseResult<RedirectOutcome> {
        let payment = self
            .payment_repo
            .find_by_wallet_source_id(source_id)
            .await
            .map_err(|err| {
                error!(%source_id, db_error = ?err, "payments: failed to look up wallet source");
                PaymentUseCaseError::Internal(err)
            })?
            .ok_or_else(|| {
                warn!(%source_id, "payments: redirect for unknown source");
                PaymentUseCaseError::UnknownSource
            })?;

        let payment_id = payment.id;
        self.guard
            .with_lock(LockKey::Payment(payment_id), || {
                self.acknowledge_locked(payment_id)
            })
            .await?
    }

    async fn acknowledge_locked(&self, payment_id: Uuid) -> UseCaseResult<RedirectOutcome> {
        let mut payment = self.load_payment(payment_id).await?;

        if !payment.is_complete() {
            if !payment.acknowledge_redirect() {
                warn!(%payment_id, method = payment.method.kind(), "payments: redirect for a payment not waiting on one");
            }

            // The wallet return carries no session; settle as anonymous.
            payment = self
                .orchestrator
                .attempt(&RequestContext::anonymous(), payment)
                .await?;
            self.payment_repo.save(&payment).await?;

            if let Some(invoice_id) = payment.invoice_id {
                for order in self.order_repo.find_by_invoice_id(invoice_id).await? {
                    if order.redirect.is_some() {
                        self.order_repo.clear_redirect(order.id).await?;
                    }
                }
            }

            info!(%payment_id, complete = payment.is_complete(), "payments: wallet redirect processed");
        } else {
            info!(%payment_id, "payments: duplicate wallet redirect ignored");
        }

        let order_id = match payment.invoice_id {
            Some(invoice_id) => self
                .order_repo
                .find_by_invoice_id(invoice_id)
                .await?
                .first()
                .map(|order| order.id),
            None => None,
        };

        Ok(RedirectOutcome { payment, order_id })
    }

    /// Saved cards for the signed-in user, without gateway references.
    pub async fn list_saved_methods(
        &self,
        ctx: &RequestContext,
    ) -> UseCaseResult<Option<SanitisedBillingProfile>> {
        let Some(user) = ctx.user() else {
            return Ok(None);
        };

        let profile = self
            .billing_repo
            .find_by_user_id(user.id)
            .await
            .map_err(|err| {
                error!(user_id = %user.id, db_error = ?err, "payments: failed to load billing profile");
                PaymentUseCaseError::Internal(err)
            })?;

        Ok(profile.map(|profile| profile.sanitised()))
    }

    async fn load_payment(&self, payment_id: Uuid) -> UseCaseResult<PaymentEntity> {
        self.payment_repo
            .find_by_id(payment_id)
            .await
            .map_err(|err| {
                error!(%payment_id, db_error = ?err, "payments: failed to load payment");
                PaymentUseCaseError::Internal(err)
            })?
            .ok_or(PaymentUseCaseError::PaymentNotFound)
    }
}
