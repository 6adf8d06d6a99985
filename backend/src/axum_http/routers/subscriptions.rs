use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::post,
};
use settlement::{
    domain::value_objects::subscriptions::SubscriptionDto,
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{locks::LockPostgres, subscriptions::SubscriptionPostgres},
    },
    payments::stripe_client::StripeClient,
};
use uuid::Uuid;

use crate::{
    auth::Caller,
    axum_http::error_responses::AppError,
    usecases::{payment_guard::PaymentStateGuard, subscriptions::SubscriptionUseCase},
};

type Subscriptions = SubscriptionUseCase<SubscriptionPostgres, LockPostgres, StripeClient>;

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    gateway: Arc<StripeClient>,
    guard: Arc<PaymentStateGuard<LockPostgres>>,
) -> Router {
    let subscription_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let usecase = SubscriptionUseCase::new(Arc::new(subscription_repository), guard, gateway);

    Router::new()
        .route("/:subscription_id/cancel", post(cancel_subscription))
        .route("/:subscription_id/reconcile", post(reconcile_subscription))
        .with_state(Arc::new(usecase))
}

pub async fn cancel_subscription(
    State(usecase): State<Arc<Subscriptions>>,
    Caller(ctx): Caller,
    Path(subscription_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if ctx.user().is_none() {
        return Err(AppError::Unauthorized);
    }

    let subscription = usecase.cancel(&ctx, subscription_id).await?;

    Ok(Json(SubscriptionDto::from(&subscription)))
}

pub async fn reconcile_subscription(
    State(usecase): State<Arc<Subscriptions>>,
    Path(subscription_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let subscription = usecase.reconcile(subscription_id).await?;

    Ok(Json(SubscriptionDto::from(&subscription)))
}
