use anyhow::Result;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    domain::value_objects::{enums::billing_periods::BillingPeriod, money},
    infra::db::postgres::schema::invoices,
};

fn default_quantity() -> u32 {
    1
}

/// One invoice line. Amounts are decimal major units of the invoice currency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub product_id: Uuid,
    #[serde(default)]
    pub sku: Option<String>,
    pub title: String,
    pub unit_price: Decimal,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub discount: Decimal,
    pub total: Decimal,
    #[serde(default)]
    pub period: Option<BillingPeriod>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceEntity {
    pub id: Uuid,
    pub currency: String,
    pub total: Decimal,
    pub lines: Vec<LineItem>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl InvoiceEntity {
    pub fn lines_total(&self) -> Decimal {
        self.lines.iter().map(|line| line.total).sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.lines_total() == self.total
    }

    pub fn product_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            if !ids.contains(&line.product_id) {
                ids.push(line.product_id);
            }
        }
        ids
    }
}

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = invoices)]
pub struct InvoiceRow {
    pub id: Uuid,
    pub currency: String,
    pub total_minor: i64,
    pub lines: Value,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for InvoiceEntity {
    type Error = anyhow::Error;

    fn try_from(row: InvoiceRow) -> Result<Self> {
        let lines: Vec<LineItem> = serde_json::from_value(row.lines)?;

        Ok(Self {
            id: row.id,
            total: money::from_minor_units(row.total_minor, &row.currency),
            currency: row.currency,
            lines,
            trial_ends_at: row.trial_ends_at,
            created_at: row.created_at,
        })
    }
}
