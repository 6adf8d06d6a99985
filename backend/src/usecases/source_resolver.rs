use std::sync::Arc;

use anyhow::Result;
use settlement::{
    domain::{
        entities::billing_profiles::{BillingProfileEntity, SavedCard},
        repositories::{billing_profiles::BillingProfileRepository, locks::LockRepository},
        value_objects::{
            payment_errors::PaymentError, payment_methods::CardDetails,
            request_context::RequestContext,
        },
    },
    payments::gateway::{GatewayCard, PaymentGateway},
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::usecases::payment_guard::{LockKey, PaymentStateGuard};

/// Email the gateway customer is created with for guest checkouts.
pub const ANONYMOUS_CUSTOMER_EMAIL: &str = "anonymous";

/// A gateway reference that can be charged, plus the customer that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeableSource {
    pub source: String,
    pub customer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceResolution {
    Ready(ChargeableSource),
    /// The customer must finish on the wallet provider's page first.
    AwaitingRedirect,
    Failed(PaymentError),
}

pub struct SourceResolver<B, L, G>
where
    B: BillingProfileRepository + Send + Sync + 'static,
    L: LockRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    billing_repo: Arc<B>,
    guard: Arc<PaymentStateGuard<L>>,
    gateway: Arc<G>,
}

impl<B, L, G> SourceResolver<B, L, G>
where
    B: BillingProfileRepository + Send + Sync + 'static,
    L: LockRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(billing_repo: Arc<B>, guard: Arc<PaymentStateGuard<L>>, gateway: Arc<G>) -> Self {
        Self {
            billing_repo,
            guard,
            gateway,
        }
    }

    pub async fn resolve_saved_card(
        &self,
        ctx: &RequestContext,
        card_id: Uuid,
    ) -> Result<SourceResolution> {
        let Some(user) = ctx.user() else {
            warn!(%card_id, "source_resolver: saved card requested without a user");
            return Ok(SourceResolution::Failed(PaymentError::no_user()));
        };

        let profile = self
            .billing_repo
            .find_by_user_id(user.id)
            .await
            .map_err(|err| {
                error!(user_id = %user.id, db_error = ?err, "source_resolver: failed to load billing profile");
                err
            })?;

        let Some(profile) = profile else {
            info!(user_id = %user.id, "source_resolver: user has no billing profile");
            return Ok(SourceResolution::Failed(PaymentError::not_found(
                "Credit card not found",
            )));
        };

        match profile.find_card(card_id) {
            Some(card) => Ok(SourceResolution::Ready(ChargeableSource {
                source: card.source.clone(),
                customer: Some(profile.customer_ref.clone()),
            })),
            None => {
                info!(user_id = %user.id, %card_id, "source_resolver: saved card not found");
                Ok(SourceResolution::Failed(PaymentError::not_found(
                    "Credit card not found",
                )))
            }
        }
    }

    /// Attaches a freshly entered card to a gateway customer. With `save` set
    /// for a signed-in user the card is appended to their billing profile.
    pub async fn resolve_new_card(
        &self,
        ctx: &RequestContext,
        card: &CardDetails,
        save: bool,
    ) -> Result<SourceResolution> {
        match ctx.user() {
            Some(user) if save => {
                self.guard
                    .with_lock(LockKey::BillingProfile(user.id), || {
                        self.attach_new_card(ctx, card, save)
                    })
                    .await?
            }
            _ => self.attach_new_card(ctx, card, save).await,
        }
    }

    async fn attach_new_card(
        &self,
        ctx: &RequestContext,
        card: &CardDetails,
        save: bool,
    ) -> Result<SourceResolution> {
        let profile = match ctx.user() {
            Some(user) => self.billing_repo.find_by_user_id(user.id).await?,
            None => None,
        };

        let customer = match profile.as_ref() {
            Some(profile) => profile.customer_ref.clone(),
            None => {
                let email = ctx
                    .user()
                    .and_then(|user| user.email.as_deref())
                    .unwrap_or(ANONYMOUS_CUSTOMER_EMAIL);
                match self.gateway.create_customer(email).await {
                    Ok(customer) => customer,
                    Err(err) => {
                        warn!(error = %err, "source_resolver: create customer failed");
                        return Ok(SourceResolution::Failed(PaymentError::gateway(&err)));
                    }
                }
            }
        };

        let attached = match self.gateway.attach_card(&customer, card).await {
            Ok(attached) => attached,
            Err(err) => {
                warn!(%customer, card = ?card, error = %err, "source_resolver: attach card failed");
                return Ok(SourceResolution::Failed(PaymentError::gateway(&err)));
            }
        };

        if save {
            if let Some(user) = ctx.user() {
                let mut profile = profile
                    .unwrap_or_else(|| BillingProfileEntity::new(user.id, customer.clone()));
                profile.add_card(saved_card(&attached));
                self.billing_repo.save(&profile).await.map_err(|err| {
                    error!(user_id = %user.id, db_error = ?err, "source_resolver: failed to save card");
                    err
                })?;
                info!(user_id = %user.id, cards = profile.cards.len(), "source_resolver: card saved");
            }
        }

        Ok(SourceResolution::Ready(ChargeableSource {
            source: attached.id,
            customer: Some(customer),
        }))
    }
}

fn saved_card(card: &GatewayCard) -> SavedCard {
    SavedCard {
        id: Uuid::new_v4(),
        brand: card.brand.to_lowercase(),
        last4: card.last4.clone(),
        funding: card.funding.clone(),
        country: card.country.clone(),
        source: card.id.clone(),
    }
}
