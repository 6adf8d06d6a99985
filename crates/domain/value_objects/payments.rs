use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::payments::PaymentEntity,
    value_objects::{payment_errors::PaymentError, payment_methods::PaymentMethod},
};

#[derive(Debug, Deserialize, Default)]
pub struct AttemptPaymentRequest {
    /// Replaces the stored method before the attempt, e.g. after a decline.
    #[serde(default)]
    pub method: Option<PaymentMethod>,
}

#[derive(Debug, Deserialize)]
pub struct RedirectCallbackQuery {
    pub source: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentDto {
    pub id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub method: &'static str,
    pub complete: bool,
    pub error: Option<PaymentError>,
    pub redirect_url: Option<String>,
}

impl From<&PaymentEntity> for PaymentDto {
    fn from(payment: &PaymentEntity) -> Self {
        Self {
            id: payment.id,
            invoice_id: payment.invoice_id,
            method: payment.method.kind(),
            complete: payment.is_complete(),
            error: payment.error().cloned(),
            redirect_url: payment.redirect_url.clone(),
        }
    }
}
