use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use settlement::{
    domain::value_objects::payments::{AttemptPaymentRequest, PaymentDto, RedirectCallbackQuery},
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            billing_profiles::BillingProfilePostgres, invoices::InvoicePostgres,
            locks::LockPostgres, orders::OrderPostgres, payments::PaymentPostgres,
            products::ProductPostgres, subscriptions::SubscriptionPostgres,
        },
    },
    payments::stripe_client::StripeClient,
};
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    auth::Caller,
    axum_http::error_responses::AppError,
    config::config_model::Shop,
    usecases::{
        charge_orchestrator::ChargeOrchestrator,
        payment_guard::PaymentStateGuard,
        payment_methods::{
            CardHandler, ClientTokenHandler, PaymentMethodRegistry, RedirectWalletHandler,
        },
        payments::{PaymentUseCase, PaymentUseCaseError},
        source_resolver::SourceResolver,
    },
};

pub const REDIRECT_CALLBACK_PATH: &str = "/api/v1/payments/redirect/process";
const CHECKOUT_PATH: &str = "/checkout";

type Orchestrator = ChargeOrchestrator<
    InvoicePostgres,
    OrderPostgres,
    ProductPostgres,
    SubscriptionPostgres,
    StripeClient,
>;

type Payments =
    PaymentUseCase<PaymentPostgres, OrderPostgres, BillingProfilePostgres, LockPostgres, Orchestrator>;

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    gateway: Arc<StripeClient>,
    guard: Arc<PaymentStateGuard<LockPostgres>>,
    shop: &Shop,
) -> Result<Router> {
    let payment_repository = Arc::new(PaymentPostgres::new(Arc::clone(&db_pool)));
    let order_repository = Arc::new(OrderPostgres::new(Arc::clone(&db_pool)));
    let billing_repository = Arc::new(BillingProfilePostgres::new(Arc::clone(&db_pool)));

    let resolver = Arc::new(SourceResolver::new(
        Arc::clone(&billing_repository),
        Arc::clone(&guard),
        Arc::clone(&gateway),
    ));
    let handlers = PaymentMethodRegistry::new()
        .register(Arc::new(CardHandler::new(resolver)))
        .register(Arc::new(ClientTokenHandler))
        .register(Arc::new(RedirectWalletHandler::new(
            Arc::clone(&gateway),
            redirect_return_url(&shop.domain)?,
            shop.currency.clone(),
        )));
    info!(methods = ?handlers.methods(), "payments: handlers registered");

    let orchestrator = ChargeOrchestrator::new(
        Arc::new(InvoicePostgres::new(Arc::clone(&db_pool))),
        Arc::clone(&order_repository),
        Arc::new(ProductPostgres::new(Arc::clone(&db_pool))),
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
        gateway,
        handlers,
        shop.currency.clone(),
    );

    let usecase = PaymentUseCase::new(
        payment_repository,
        order_repository,
        billing_repository,
        guard,
        Arc::new(orchestrator),
    );

    Ok(Router::new()
        .route("/:payment_id/attempt", post(attempt_payment))
        .route("/redirect/process", get(process_redirect))
        .route("/methods", get(list_methods))
        .with_state(Arc::new(usecase)))
}

/// Absolute URL the wallet provider sends the customer back to.
pub fn redirect_return_url(domain: &str) -> Result<String> {
    let base = Url::parse(&format!("https://{}", domain.trim().trim_end_matches('/')))
        .with_context(|| format!("PUBLIC_DOMAIN {domain:?} is not a valid host"))?;

    Ok(base.join(REDIRECT_CALLBACK_PATH)?.to_string())
}

pub async fn attempt_payment(
    State(usecase): State<Arc<Payments>>,
    Caller(ctx): Caller,
    Path(payment_id): Path<Uuid>,
    body: Option<Json<AttemptPaymentRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let method = body.and_then(|Json(request)| request.method);

    let payment = usecase
        .process_payment_attempt(&ctx, payment_id, method)
        .await?;

    let status = if payment.error().is_some() {
        StatusCode::PAYMENT_REQUIRED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(PaymentDto::from(&payment))))
}

pub async fn process_redirect(
    State(usecase): State<Arc<Payments>>,
    Query(query): Query<RedirectCallbackQuery>,
) -> Result<Redirect, AppError> {
    match usecase.process_redirect_callback(&query.source).await {
        Ok(outcome) => match outcome.order_id {
            Some(order_id) if outcome.payment.is_complete() => {
                Ok(Redirect::to(&format!("/order/{order_id}")))
            }
            _ => {
                warn!(
                    payment_id = %outcome.payment.id,
                    source = %query.source,
                    "payments: wallet payment not settled; back to checkout"
                );
                Ok(Redirect::to(CHECKOUT_PATH))
            }
        },
        Err(PaymentUseCaseError::UnknownSource) => {
            warn!(source = %query.source, "payments: callback for unknown source");
            Ok(Redirect::to(CHECKOUT_PATH))
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn list_methods(
    State(usecase): State<Arc<Payments>>,
    Caller(ctx): Caller,
) -> Result<impl IntoResponse, AppError> {
    if ctx.user().is_none() {
        return Err(AppError::Unauthorized);
    }

    let profile = usecase.list_saved_methods(&ctx).await?;

    Ok(Json(profile))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_url_points_at_callback() {
        assert_eq!(
            redirect_return_url("shop.example.com").unwrap(),
            "https://shop.example.com/api/v1/payments/redirect/process"
        );
        assert_eq!(
            redirect_return_url("shop.example.com/").unwrap(),
            "https://shop.example.com/api/v1/payments/redirect/process"
        );
    }

    #[test]
    fn return_url_rejects_garbage_domain() {
        assert!(redirect_return_url("not a host").is_err());
    }
}
