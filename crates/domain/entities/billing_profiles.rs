use anyhow::Result;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::infra::db::postgres::schema::billing_profiles;

/// Card stored for reuse. Only the gateway reference and display fields are
/// kept; the card number never reaches this type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedCard {
    pub id: Uuid,
    pub brand: String,
    pub last4: String,
    #[serde(default)]
    pub funding: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    /// Gateway card reference used as the charge source.
    pub source: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SavedCardSummary {
    pub id: Uuid,
    pub brand: String,
    pub last4: String,
    pub funding: Option<String>,
    pub country: Option<String>,
}

impl From<&SavedCard> for SavedCardSummary {
    fn from(card: &SavedCard) -> Self {
        Self {
            id: card.id,
            brand: card.brand.clone(),
            last4: card.last4.clone(),
            funding: card.funding.clone(),
            country: card.country.clone(),
        }
    }
}

/// Client-facing view of a billing profile without gateway references.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SanitisedBillingProfile {
    pub id: Uuid,
    pub cards: Vec<SavedCardSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BillingProfileEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub customer_ref: String,
    pub cards: Vec<SavedCard>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BillingProfileEntity {
    pub fn new(user_id: Uuid, customer_ref: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            customer_ref,
            cards: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn find_card(&self, card_id: Uuid) -> Option<&SavedCard> {
        self.cards.iter().find(|card| card.id == card_id)
    }

    pub fn add_card(&mut self, card: SavedCard) {
        self.cards.push(card);
        self.updated_at = Utc::now();
    }

    pub fn sanitised(&self) -> SanitisedBillingProfile {
        SanitisedBillingProfile {
            id: self.id,
            cards: self.cards.iter().map(SavedCardSummary::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Identifiable, Selectable, Queryable, Insertable)]
#[diesel(table_name = billing_profiles)]
pub struct BillingProfileRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub customer_ref: String,
    pub cards: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<BillingProfileRow> for BillingProfileEntity {
    type Error = anyhow::Error;

    fn try_from(row: BillingProfileRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            customer_ref: row.customer_ref,
            cards: serde_json::from_value(row.cards)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<&BillingProfileEntity> for BillingProfileRow {
    type Error = anyhow::Error;

    fn try_from(profile: &BillingProfileEntity) -> Result<Self> {
        Ok(Self {
            id: profile.id,
            user_id: profile.user_id,
            customer_ref: profile.customer_ref.clone(),
            cards: serde_json::to_value(&profile.cards)?,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        })
    }
}
