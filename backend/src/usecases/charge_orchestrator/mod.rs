//! Settles one payment attempt: registers recurring subscriptions for the
//! subscription lines of the invoice and charges whatever remains.

use std::{collections::HashMap, sync::Arc};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use rust_decimal::Decimal;
use serde_json::Value;
use settlement::{
    domain::{
        entities::{
            invoices::InvoiceEntity, payments::PaymentEntity, subscriptions::SubscriptionEntity,
        },
        repositories::{
            invoices::InvoiceRepository, orders::OrderRepository, products::ProductRepository,
            subscriptions::SubscriptionRepository,
        },
        value_objects::{
            money,
            payment_errors::PaymentError,
            proration::{PricedLine, Proration},
            request_context::RequestContext,
        },
    },
    payments::gateway::{
        CouponRequest, PaymentGateway, PlanRequest, SubscriptionItemRequest, SubscriptionRequest,
    },
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::usecases::{
    payment_methods::{PaymentMethodHandler, PaymentMethodRegistry},
    source_resolver::{ChargeableSource, SourceResolution},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChargeAttempt: Send + Sync {
    /// Runs one attempt and returns the payment with its new state. Business
    /// failures are recorded on the payment; `Err` is reserved for
    /// persistence failures before anything was sent to the gateway.
    async fn attempt(&self, ctx: &RequestContext, payment: PaymentEntity) -> Result<PaymentEntity>;
}

/// Subscription record paired with the invoice line it bills.
type SubscriptionPair = (SubscriptionEntity, PricedLine);

pub struct ChargeOrchestrator<I, O, P, S, G>
where
    I: InvoiceRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    P: ProductRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    invoice_repo: Arc<I>,
    order_repo: Arc<O>,
    product_repo: Arc<P>,
    subscription_repo: Arc<S>,
    gateway: Arc<G>,
    handlers: PaymentMethodRegistry,
    default_currency: String,
}

impl<I, O, P, S, G> ChargeOrchestrator<I, O, P, S, G>
where
    I: InvoiceRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    P: ProductRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(
        invoice_repo: Arc<I>,
        order_repo: Arc<O>,
        product_repo: Arc<P>,
        subscription_repo: Arc<S>,
        gateway: Arc<G>,
        handlers: PaymentMethodRegistry,
        default_currency: String,
    ) -> Self {
        Self {
            invoice_repo,
            order_repo,
            product_repo,
            subscription_repo,
            gateway,
            handlers,
            default_currency,
        }
    }

    async fn load_invoice(&self, payment: &PaymentEntity) -> Result<Option<InvoiceEntity>> {
        let Some(invoice_id) = payment.invoice_id else {
            return Ok(None);
        };

        let invoice = self.invoice_repo.find_by_id(invoice_id).await.map_err(|err| {
            error!(%invoice_id, db_error = ?err, "charge: failed to load invoice");
            err
        })?;

        match &invoice {
            Some(invoice) if !invoice.is_balanced() => warn!(
                %invoice_id,
                invoice_total = %invoice.total,
                lines_total = %invoice.lines_total(),
                "charge: invoice lines do not add up to the invoice total"
            ),
            Some(_) => {}
            None => warn!(%invoice_id, payment_id = %payment.id, "charge: invoice not found; charging payment amount"),
        }

        Ok(invoice)
    }

    /// Joins invoice lines with product types. A missing product is a
    /// business failure, not an infrastructure one.
    async fn priced_lines(
        &self,
        invoice: Option<&InvoiceEntity>,
    ) -> Result<std::result::Result<Vec<PricedLine>, PaymentError>> {
        let Some(invoice) = invoice else {
            return Ok(Ok(Vec::new()));
        };
        if invoice.lines.is_empty() {
            return Ok(Ok(Vec::new()));
        }

        let products = self
            .product_repo
            .find_by_ids(invoice.product_ids())
            .await
            .map_err(|err| {
                error!(invoice_id = %invoice.id, db_error = ?err, "charge: failed to load products");
                err
            })?;
        let product_types: HashMap<Uuid, _> = products
            .into_iter()
            .map(|product| (product.id, product.product_type))
            .collect();

        let mut lines = Vec::with_capacity(invoice.lines.len());
        for line in &invoice.lines {
            let Some(product_type) = product_types.get(&line.product_id) else {
                return Ok(Err(PaymentError::not_found(format!(
                    "Product {} not found",
                    line.product_id
                ))));
            };
            lines.push(PricedLine {
                product_id: line.product_id,
                product_type: *product_type,
                title: line.title.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
                discount: line.discount,
                period: line.period,
            });
        }

        Ok(Ok(lines))
    }

    async fn load_subscriptions(&self, invoice: &InvoiceEntity) -> Result<Vec<SubscriptionEntity>> {
        let orders = self.order_repo.find_by_invoice_id(invoice.id).await?;
        let order_ids = orders.into_iter().map(|order| order.id).collect();
        let subscriptions = self.subscription_repo.find_by_order_ids(order_ids).await?;
        Ok(subscriptions)
    }

    async fn settle(
        &self,
        payment: &PaymentEntity,
        handler: &dyn PaymentMethodHandler,
        source: &ChargeableSource,
        currency: &str,
        invoice: Option<&InvoiceEntity>,
        proration: &Proration,
        pairs: Vec<SubscriptionPair>,
    ) -> Result<Option<Value>, SettleError> {
        if !pairs.is_empty() {
            self.register_subscriptions(payment, source, currency, invoice, pairs)
                .await?;
        }

        let amount_minor = money::normalize(proration.real_total, currency);
        if !proration.requires_charge() || amount_minor <= 0 {
            info!(
                payment_id = %payment.id,
                real_total = %proration.real_total,
                "charge: subscriptions cover the full amount; no one-off charge"
            );
            return Ok(None);
        }

        let request = handler.compute_charge(payment, source, amount_minor, currency);
        debug!(payment_id = %payment.id, amount_minor, %currency, "charge: creating charge");

        let charge = self
            .gateway
            .create_charge(&request)
            .await
            .context("create charge")?;

        info!(payment_id = %payment.id, amount_minor, %currency, "charge: charge succeeded");
        Ok(Some(charge))
    }

    async fn register_subscriptions(
        &self,
        payment: &PaymentEntity,
        source: &ChargeableSource,
        currency: &str,
        invoice: Option<&InvoiceEntity>,
        pairs: Vec<SubscriptionPair>,
    ) -> Result<(), SettleError> {
        let customer = source
            .customer
            .clone()
            .ok_or_else(|| anyhow!("subscriptions need a gateway customer"))?;

        let pending: Vec<SubscriptionPair> = pairs
            .into_iter()
            .filter(|(subscription, _)| {
                if subscription.is_registered() {
                    debug!(subscription_id = %subscription.id, "charge: subscription already registered");
                }
                !subscription.is_registered() && !subscription.is_cancelled()
            })
            .collect();
        if pending.is_empty() {
            info!(payment_id = %payment.id, "charge: all subscriptions already registered");
            return Ok(());
        }

        let key = registration_key(payment, &customer, &pending);

        let plan_ids = try_join_all(
            pending
                .iter()
                .map(|(subscription, line)| self.create_plan(&key, subscription, line, currency)),
        )
        .await?;

        let coupon = match Proration::coupon_for(pending.iter().map(|(_, line)| line)) {
            Some(amount) => Some(self.create_coupon(&key, amount, currency).await?),
            None => None,
        };

        let request = SubscriptionRequest {
            customer,
            items: pending
                .iter()
                .zip(&plan_ids)
                .map(|((_, line), plan_id)| SubscriptionItemRequest {
                    plan_id: plan_id.clone(),
                    quantity: line.quantity,
                })
                .collect(),
            trial_end: invoice
                .and_then(|invoice| invoice.trial_ends_at)
                .map(|trial_end| trial_end.timestamp()),
            coupon,
            idempotency_key: key.clone(),
        };

        let created = self
            .gateway
            .create_subscription(&request)
            .await
            .context("create subscription")?;
        info!(
            payment_id = %payment.id,
            provider_subscription_id = %created.id,
            items = request.items.len(),
            "charge: gateway subscription created"
        );

        let activated: Vec<SubscriptionEntity> = pending
            .into_iter()
            .zip(plan_ids)
            .map(|((mut subscription, _), plan_id)| {
                subscription.activate(plan_id, created.id.clone(), created.raw.clone());
                subscription
            })
            .collect();

        if let Err(err) = self.subscription_repo.save_all(&activated).await {
            error!(
                payment_id = %payment.id,
                provider_subscription_id = %created.id,
                registration_key = %key,
                db_error = ?err,
                "charge: gateway subscription created but local records not saved"
            );
            return Err(SettleError::Unrecorded {
                provider_subscription_id: created.id,
            });
        }

        Ok(())
    }

    async fn create_plan(
        &self,
        key: &str,
        subscription: &SubscriptionEntity,
        line: &PricedLine,
        currency: &str,
    ) -> Result<String> {
        let (interval, interval_count) = subscription.period.interval();
        let request = PlanRequest {
            amount_minor: money::normalize(line.unit_price, currency),
            currency: currency.to_string(),
            product_name: line.title.clone(),
            interval,
            interval_count,
            idempotency_key: format!("{key}-plan-{}", subscription.id),
        };

        self.gateway
            .create_plan(&request)
            .await
            .with_context(|| format!("create plan for '{}'", line.title))
    }

    async fn create_coupon(&self, key: &str, amount: Decimal, currency: &str) -> Result<String> {
        let request = CouponRequest {
            id: format!("coupon-{key}"),
            amount_off_minor: money::normalize(amount, currency),
            currency: currency.to_string(),
            idempotency_key: format!("{key}-coupon"),
        };

        self.gateway
            .create_coupon(&request)
            .await
            .context("create coupon")
    }
}

#[derive(Debug, Error)]
enum SettleError {
    #[error(transparent)]
    Gateway(#[from] anyhow::Error),
    #[error("gateway subscription {provider_subscription_id} was created but not recorded")]
    Unrecorded { provider_subscription_id: String },
}

/// Stable across retries of the same registration, so a replayed attempt
/// gets back the gateway objects created the first time.
fn registration_key(payment: &PaymentEntity, customer: &str, pending: &[SubscriptionPair]) -> String {
    let mut subscription_ids: Vec<String> = pending
        .iter()
        .map(|(subscription, _)| subscription.id.to_string())
        .collect();
    subscription_ids.sort();

    let name = format!("{}:{customer}:{}", payment.id, subscription_ids.join(","));
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

/// Pairs each subscription record with its invoice line by product and
/// period. Any record or line left unmatched fails the attempt.
fn match_subscriptions(
    proration: &Proration,
    subscriptions: Vec<SubscriptionEntity>,
) -> std::result::Result<Vec<SubscriptionPair>, PaymentError> {
    let mut pairs = Vec::with_capacity(subscriptions.len());

    // A record cancelled before it reached the gateway bills nothing.
    let live = subscriptions.into_iter().filter(|subscription| {
        if subscription.is_cancelled() {
            debug!(subscription_id = %subscription.id, "charge: skipping cancelled subscription");
        }
        !subscription.is_cancelled()
    });

    for subscription in live {
        let Some(line) = proration.find_line(subscription.product_id, subscription.period) else {
            return Err(PaymentError::not_found(format!(
                "No {} line item for subscription {}",
                subscription.period, subscription.id
            )));
        };
        let line = line.clone();
        pairs.push((subscription, line));
    }

    for line in &proration.subscription_lines {
        let matched = pairs.iter().any(|(subscription, _)| {
            subscription.product_id == line.product_id && Some(subscription.period) == line.period
        });
        if !matched {
            return Err(PaymentError::not_found(format!(
                "Subscription not found for '{}'",
                line.title
            )));
        }
    }

    Ok(pairs)
}

#[async_trait]
impl<I, O, P, S, G> ChargeAttempt for ChargeOrchestrator<I, O, P, S, G>
where
    I: InvoiceRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    P: ProductRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    async fn attempt(
        &self,
        ctx: &RequestContext,
        mut payment: PaymentEntity,
    ) -> Result<PaymentEntity> {
        if payment.is_complete() {
            debug!(payment_id = %payment.id, "charge: payment already complete");
            return Ok(payment);
        }

        let currency = money::resolve_currency(&payment.currency, &self.default_currency);

        let Some(handler) = self.handlers.handler_for(&payment.method) else {
            warn!(payment_id = %payment.id, method = payment.method.kind(), "charge: no handler for payment method");
            payment.mark_failed(PaymentError::not_found(format!(
                "Payment method {} is not supported",
                payment.method.kind()
            )));
            return Ok(payment);
        };

        let invoice = self.load_invoice(&payment).await?;
        let lines = match self.priced_lines(invoice.as_ref()).await? {
            Ok(lines) => lines,
            Err(err) => {
                warn!(payment_id = %payment.id, error = %err, "charge: invoice lines could not be priced");
                payment.mark_failed(err);
                return Ok(payment);
            }
        };

        let proration = Proration::calculate(payment.amount, &lines);

        let pairs = match (&invoice, proration.has_subscriptions()) {
            (Some(invoice), true) => {
                if !handler.supports_recurring() {
                    warn!(payment_id = %payment.id, method = handler.describe_method(), "charge: method cannot pay for subscriptions");
                    payment.mark_failed(PaymentError::recurring_unsupported(
                        handler.describe_method(),
                    ));
                    return Ok(payment);
                }

                let subscriptions = self.load_subscriptions(invoice).await.map_err(|err| {
                    error!(invoice_id = %invoice.id, db_error = ?err, "charge: failed to load subscriptions");
                    err
                })?;
                match match_subscriptions(&proration, subscriptions) {
                    Ok(pairs) => pairs,
                    Err(err) => {
                        warn!(payment_id = %payment.id, error = %err, "charge: subscriptions do not match invoice");
                        payment.mark_failed(err);
                        return Ok(payment);
                    }
                }
            }
            _ => Vec::new(),
        };

        let source = match handler.resolve_source(ctx, &mut payment).await? {
            SourceResolution::Ready(source) => source,
            SourceResolution::AwaitingRedirect => {
                info!(payment_id = %payment.id, "charge: waiting for wallet redirect");
                return Ok(payment);
            }
            SourceResolution::Failed(err) => {
                warn!(payment_id = %payment.id, error = %err, "charge: source resolution failed");
                payment.mark_failed(err);
                return Ok(payment);
            }
        };

        match self
            .settle(
                &payment,
                handler.as_ref(),
                &source,
                &currency,
                invoice.as_ref(),
                &proration,
                pairs,
            )
            .await
        {
            Ok(charge) => {
                payment.mark_complete(charge);
                info!(payment_id = %payment.id, "charge: payment complete");
            }
            Err(SettleError::Gateway(err)) => {
                warn!(payment_id = %payment.id, error = %format!("{err:#}"), "charge: settlement failed");
                payment.mark_failed(PaymentError::gateway(&err));
            }
            Err(SettleError::Unrecorded {
                provider_subscription_id,
            }) => {
                warn!(payment_id = %payment.id, %provider_subscription_id, "charge: settlement not recorded");
                payment.mark_failed(PaymentError::recording_failed());
            }
        }

        Ok(payment)
    }
}

#[cfg(test)]
mod tests;
