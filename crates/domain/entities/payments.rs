use anyhow::{Result, ensure};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    domain::value_objects::{
        money, payment_errors::PaymentError, payment_methods::PaymentMethod,
    },
    infra::db::postgres::schema::payments,
};

/// A single settlement attempt for an invoice.
///
/// Completion and failure are only reachable through the state methods so a
/// completed payment never picks up an error afterwards.
#[derive(Debug, Clone)]
pub struct PaymentEntity {
    pub id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: String,
    pub method: PaymentMethod,
    pub redirect_url: Option<String>,
    complete: bool,
    error: Option<PaymentError>,
    gateway_response: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentEntity {
    pub fn new(
        id: Uuid,
        invoice_id: Option<Uuid>,
        user_id: Option<Uuid>,
        amount: Decimal,
        currency: &str,
        method: PaymentMethod,
    ) -> Result<Self> {
        ensure!(
            amount > Decimal::ZERO,
            "payment amount must be positive, got {amount}"
        );

        let now = Utc::now();
        Ok(Self {
            id,
            invoice_id,
            user_id,
            amount,
            currency: currency.trim().to_ascii_lowercase(),
            method,
            redirect_url: None,
            complete: false,
            error: None,
            gateway_response: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn error(&self) -> Option<&PaymentError> {
        self.error.as_ref()
    }

    pub fn gateway_response(&self) -> Option<&Value> {
        self.gateway_response.as_ref()
    }

    /// Charge description sent to the gateway.
    pub fn describe(&self) -> String {
        format!("Payment ID {}", self.id)
    }

    pub fn mark_complete(&mut self, gateway_response: Option<Value>) {
        self.complete = true;
        self.error = None;
        if gateway_response.is_some() {
            self.gateway_response = gateway_response;
        }
        self.updated_at = Utc::now();
    }

    /// Ignored once the payment is complete.
    pub fn mark_failed(&mut self, error: PaymentError) {
        if self.complete {
            return;
        }
        self.error = Some(error);
        self.updated_at = Utc::now();
    }

    /// Records the wallet source and the URL the customer must visit.
    pub fn await_redirect(&mut self, source_id: String, redirect_url: String, source: Value) {
        if let PaymentMethod::RedirectWallet {
            source_id: stored, ..
        } = &mut self.method
        {
            *stored = Some(source_id);
        }
        self.redirect_url = Some(redirect_url);
        self.gateway_response = Some(source);
        self.complete = false;
        self.error = None;
        self.updated_at = Utc::now();
    }

    /// Marks a pending wallet source as returned from the provider. Returns
    /// false when the payment is not waiting on a redirect.
    pub fn acknowledge_redirect(&mut self) -> bool {
        match &mut self.method {
            PaymentMethod::RedirectWallet {
                source_id: Some(_),
                acknowledged,
                ..
            } => {
                *acknowledged = true;
                self.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payments)]
pub struct PaymentRow {
    pub id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub amount_minor: i64,
    pub currency: String,
    pub method: Value,
    pub wallet_source_id: Option<String>,
    pub redirect_url: Option<String>,
    pub complete: bool,
    pub error: Option<Value>,
    pub gateway_response: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for PaymentEntity {
    type Error = anyhow::Error;

    fn try_from(row: PaymentRow) -> Result<Self> {
        let method: PaymentMethod = serde_json::from_value(row.method)?;
        let error: Option<PaymentError> = row.error.map(serde_json::from_value).transpose()?;

        Ok(Self {
            id: row.id,
            invoice_id: row.invoice_id,
            user_id: row.user_id,
            amount: money::from_minor_units(row.amount_minor, &row.currency),
            currency: row.currency,
            method,
            redirect_url: row.redirect_url,
            complete: row.complete,
            error,
            gateway_response: row.gateway_response,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = payments, treat_none_as_null = true)]
pub struct PaymentChangeset {
    pub method: Value,
    pub wallet_source_id: Option<String>,
    pub redirect_url: Option<String>,
    pub complete: bool,
    pub error: Option<Value>,
    pub gateway_response: Option<Value>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<&PaymentEntity> for PaymentChangeset {
    type Error = anyhow::Error;

    fn try_from(payment: &PaymentEntity) -> Result<Self> {
        Ok(Self {
            method: serde_json::to_value(&payment.method)?,
            wallet_source_id: payment.method.wallet_source_id().map(str::to_string),
            redirect_url: payment.redirect_url.clone(),
            complete: payment.complete,
            error: payment.error.as_ref().map(serde_json::to_value).transpose()?,
            gateway_response: payment.gateway_response.clone(),
            updated_at: payment.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;
    use crate::domain::value_objects::payment_errors::PaymentErrorKind;

    fn wallet_payment() -> PaymentEntity {
        PaymentEntity::new(
            Uuid::new_v4(),
            None,
            None,
            dec!(12.00),
            "USD",
            PaymentMethod::RedirectWallet {
                wallet: "alipay".to_string(),
                source_id: None,
                acknowledged: false,
            },
        )
        .unwrap()
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let result = PaymentEntity::new(
            Uuid::new_v4(),
            None,
            None,
            dec!(0),
            "usd",
            PaymentMethod::ClientToken {
                token: "tok_1".to_string(),
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn completed_payment_ignores_later_failures() {
        let mut payment = wallet_payment();
        payment.mark_complete(Some(json!({"id": "ch_1"})));
        payment.mark_failed(PaymentError::no_user());

        assert!(payment.is_complete());
        assert!(payment.error().is_none());
        assert_eq!(payment.gateway_response(), Some(&json!({"id": "ch_1"})));
    }

    #[test]
    fn completion_clears_previous_error() {
        let mut payment = wallet_payment();
        payment.mark_failed(PaymentError::new(PaymentErrorKind::GatewayError, "declined"));
        payment.mark_complete(None);

        assert!(payment.is_complete());
        assert!(payment.error().is_none());
    }

    #[test]
    fn redirect_flow_stores_source_then_acknowledges() {
        let mut payment = wallet_payment();
        assert!(!payment.acknowledge_redirect());

        payment.await_redirect(
            "src_1".to_string(),
            "https://wallet.example/pay".to_string(),
            json!({"id": "src_1"}),
        );
        assert_eq!(payment.method.wallet_source_id(), Some("src_1"));
        assert_eq!(payment.redirect_url.as_deref(), Some("https://wallet.example/pay"));
        assert!(!payment.is_complete());

        assert!(payment.acknowledge_redirect());
        assert!(payment.method.is_redirect_acknowledged());

        let changes = PaymentChangeset::try_from(&payment).unwrap();
        assert_eq!(changes.wallet_source_id.as_deref(), Some("src_1"));
        assert_eq!(changes.method["acknowledged"], true);
    }
}
