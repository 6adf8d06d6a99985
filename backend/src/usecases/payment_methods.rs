//! Per-method strategies for turning a payment into a chargeable source.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use settlement::{
    domain::{
        entities::payments::PaymentEntity,
        repositories::{billing_profiles::BillingProfileRepository, locks::LockRepository},
        value_objects::{
            money, payment_errors::PaymentError, payment_methods::PaymentMethod,
            request_context::RequestContext,
        },
    },
    payments::gateway::{ChargeRequest, PaymentGateway, RedirectSourceRequest},
};
use tracing::{info, warn};

use crate::usecases::source_resolver::{ChargeableSource, SourceResolution, SourceResolver};

#[async_trait]
pub trait PaymentMethodHandler: Send + Sync {
    fn describe_method(&self) -> &'static str;

    fn handles(&self, method: &PaymentMethod) -> bool;

    /// Whether sources from this method can back gateway subscriptions.
    fn supports_recurring(&self) -> bool {
        true
    }

    async fn resolve_source(
        &self,
        ctx: &RequestContext,
        payment: &mut PaymentEntity,
    ) -> Result<SourceResolution>;

    fn compute_charge(
        &self,
        payment: &PaymentEntity,
        source: &ChargeableSource,
        amount_minor: i64,
        currency: &str,
    ) -> ChargeRequest {
        ChargeRequest {
            amount_minor,
            currency: currency.to_string(),
            source: source.source.clone(),
            customer: source.customer.clone(),
            description: payment.describe(),
        }
    }
}

/// Ordered handler lookup; the first handler that accepts a method wins.
#[derive(Clone, Default)]
pub struct PaymentMethodRegistry {
    handlers: Vec<Arc<dyn PaymentMethodHandler>>,
}

impl PaymentMethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, handler: Arc<dyn PaymentMethodHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn handler_for(&self, method: &PaymentMethod) -> Option<Arc<dyn PaymentMethodHandler>> {
        self.handlers
            .iter()
            .find(|handler| handler.handles(method))
            .cloned()
    }

    pub fn methods(&self) -> Vec<&'static str> {
        self.handlers
            .iter()
            .map(|handler| handler.describe_method())
            .collect()
    }
}

/// New cards and cards saved on the user's billing profile.
pub struct CardHandler<B, L, G>
where
    B: BillingProfileRepository + Send + Sync + 'static,
    L: LockRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    resolver: Arc<SourceResolver<B, L, G>>,
}

impl<B, L, G> CardHandler<B, L, G>
where
    B: BillingProfileRepository + Send + Sync + 'static,
    L: LockRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(resolver: Arc<SourceResolver<B, L, G>>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl<B, L, G> PaymentMethodHandler for CardHandler<B, L, G>
where
    B: BillingProfileRepository + Send + Sync + 'static,
    L: LockRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    fn describe_method(&self) -> &'static str {
        "card"
    }

    fn handles(&self, method: &PaymentMethod) -> bool {
        matches!(
            method,
            PaymentMethod::Card { .. } | PaymentMethod::SavedCard { .. }
        )
    }

    async fn resolve_source(
        &self,
        ctx: &RequestContext,
        payment: &mut PaymentEntity,
    ) -> Result<SourceResolution> {
        match &payment.method {
            PaymentMethod::SavedCard { card_id } => {
                self.resolver.resolve_saved_card(ctx, *card_id).await
            }
            PaymentMethod::Card {
                card: Some(card),
                save,
            } => self.resolver.resolve_new_card(ctx, card, *save).await,
            // Card details are never persisted, so a re-attempt must resubmit them.
            PaymentMethod::Card { card: None, .. } => Ok(SourceResolution::Failed(
                PaymentError::not_found("Credit card details missing; please re-enter the card"),
            )),
            other => Ok(SourceResolution::Failed(PaymentError::not_found(format!(
                "card handler cannot pay with {}",
                other.kind()
            )))),
        }
    }
}

/// Single-use tokens produced by the gateway's client-side library.
pub struct ClientTokenHandler;

#[async_trait]
impl PaymentMethodHandler for ClientTokenHandler {
    fn describe_method(&self) -> &'static str {
        "client_token"
    }

    fn handles(&self, method: &PaymentMethod) -> bool {
        matches!(method, PaymentMethod::ClientToken { .. })
    }

    fn supports_recurring(&self) -> bool {
        false
    }

    async fn resolve_source(
        &self,
        _ctx: &RequestContext,
        payment: &mut PaymentEntity,
    ) -> Result<SourceResolution> {
        match &payment.method {
            PaymentMethod::ClientToken { token } if !token.trim().is_empty() => {
                Ok(SourceResolution::Ready(ChargeableSource {
                    source: token.trim().to_string(),
                    customer: None,
                }))
            }
            _ => Ok(SourceResolution::Failed(PaymentError::not_found(
                "Payment token missing",
            ))),
        }
    }
}

/// Wallets that send the customer to the provider and back (e.g. Alipay).
pub struct RedirectWalletHandler<G>
where
    G: PaymentGateway + Send + Sync + 'static,
{
    gateway: Arc<G>,
    return_url: String,
    default_currency: String,
}

impl<G> RedirectWalletHandler<G>
where
    G: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(gateway: Arc<G>, return_url: String, default_currency: String) -> Self {
        Self {
            gateway,
            return_url,
            default_currency,
        }
    }
}

#[async_trait]
impl<G> PaymentMethodHandler for RedirectWalletHandler<G>
where
    G: PaymentGateway + Send + Sync + 'static,
{
    fn describe_method(&self) -> &'static str {
        "redirect_wallet"
    }

    fn handles(&self, method: &PaymentMethod) -> bool {
        matches!(method, PaymentMethod::RedirectWallet { .. })
    }

    fn supports_recurring(&self) -> bool {
        false
    }

    async fn resolve_source(
        &self,
        _ctx: &RequestContext,
        payment: &mut PaymentEntity,
    ) -> Result<SourceResolution> {
        let wallet = match &payment.method {
            PaymentMethod::RedirectWallet {
                source_id: Some(source_id),
                acknowledged: true,
                ..
            } => {
                return Ok(SourceResolution::Ready(ChargeableSource {
                    source: source_id.clone(),
                    customer: None,
                }));
            }
            PaymentMethod::RedirectWallet { wallet, .. } => wallet.clone(),
            other => {
                return Ok(SourceResolution::Failed(PaymentError::not_found(format!(
                    "wallet handler cannot pay with {}",
                    other.kind()
                ))));
            }
        };

        let currency = money::resolve_currency(&payment.currency, &self.default_currency);
        let request = RedirectSourceRequest {
            source_type: wallet.clone(),
            amount_minor: money::normalize(payment.amount, &currency),
            currency,
            return_url: self.return_url.clone(),
        };

        let source = match self.gateway.create_redirect_source(&request).await {
            Ok(source) => source,
            Err(err) => {
                warn!(payment_id = %payment.id, %wallet, error = %err, "wallet: create source failed");
                return Ok(SourceResolution::Failed(PaymentError::gateway(&err)));
            }
        };

        let Some(redirect_url) = source.redirect_url.clone() else {
            warn!(payment_id = %payment.id, source_id = %source.id, "wallet: source has no redirect url");
            return Ok(SourceResolution::Failed(PaymentError::no_redirect_uri()));
        };

        info!(payment_id = %payment.id, source_id = %source.id, %wallet, "wallet: awaiting customer redirect");
        payment.await_redirect(source.id, redirect_url, source.raw);
        Ok(SourceResolution::AwaitingRedirect)
    }
}
