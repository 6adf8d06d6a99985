use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Serialised through `as_str`, so the wire name and `Display` agree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(into = "&'static str", try_from = "String")]
pub enum PaymentErrorKind {
    NoUser,
    NotFound,
    NoRedirectUri,
    GatewayError,
    RecurringUnsupported,
    /// The gateway accepted the work but the local records were not saved.
    RecordingFailed,
}

impl PaymentErrorKind {
    pub const ALL: [PaymentErrorKind; 6] = [
        PaymentErrorKind::NoUser,
        PaymentErrorKind::NotFound,
        PaymentErrorKind::NoRedirectUri,
        PaymentErrorKind::GatewayError,
        PaymentErrorKind::RecurringUnsupported,
        PaymentErrorKind::RecordingFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentErrorKind::NoUser => "no-user",
            PaymentErrorKind::NotFound => "not-found",
            PaymentErrorKind::NoRedirectUri => "no-redirect-uri",
            PaymentErrorKind::GatewayError => "gateway-error",
            PaymentErrorKind::RecurringUnsupported => "recurring-unsupported",
            PaymentErrorKind::RecordingFailed => "recording-failed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

impl From<PaymentErrorKind> for &'static str {
    fn from(kind: PaymentErrorKind) -> Self {
        kind.as_str()
    }
}

impl TryFrom<String> for PaymentErrorKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value).ok_or_else(|| format!("unknown payment error kind '{value}'"))
    }
}

impl Display for PaymentErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure recorded on a payment after an attempt. Shown to the customer, so
/// the message must never carry card data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct PaymentError {
    pub kind: PaymentErrorKind,
    pub message: String,
}

impl PaymentError {
    pub fn new(kind: PaymentErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn no_user() -> Self {
        Self::new(PaymentErrorKind::NoUser, "Invalid user")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorKind::NotFound, message)
    }

    pub fn no_redirect_uri() -> Self {
        Self::new(PaymentErrorKind::NoRedirectUri, "No redirect URI present")
    }

    /// Keeps the full context chain of a gateway failure as the message.
    pub fn gateway(err: &anyhow::Error) -> Self {
        Self::new(PaymentErrorKind::GatewayError, format!("{err:#}"))
    }

    /// Carries no storage detail; the cause is logged where it happened.
    pub fn recording_failed() -> Self {
        Self::new(
            PaymentErrorKind::RecordingFailed,
            "Your subscription was set up but could not be saved. Please retry the payment.",
        )
    }

    pub fn recurring_unsupported(method: &str) -> Self {
        Self::new(
            PaymentErrorKind::RecurringUnsupported,
            format!("{method} payments cannot pay for subscriptions"),
        )
    }
}
