use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw card fields as submitted at checkout. Only ever sent to the gateway;
/// never serialized and redacted in debug output.
#[derive(Clone, Deserialize)]
pub struct CardDetails {
    pub number: String,
    pub exp_month: u32,
    pub exp_year: u32,
    pub cvc: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl CardDetails {
    pub fn last4(&self) -> &str {
        let digits = self.number.trim();
        digits.get(digits.len().saturating_sub(4)..).unwrap_or_default()
    }
}

impl fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardDetails")
            .field("number", &format_args!("**** {}", self.last4()))
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .field("cvc", &"***")
            .field("name", &self.name)
            .finish()
    }
}

/// How the customer chose to pay. Persisted on the payment as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentMethod {
    Card {
        #[serde(default, skip_serializing)]
        card: Option<CardDetails>,
        #[serde(default)]
        save: bool,
    },
    SavedCard {
        card_id: Uuid,
    },
    RedirectWallet {
        wallet: String,
        #[serde(default)]
        source_id: Option<String>,
        #[serde(default)]
        acknowledged: bool,
    },
    ClientToken {
        token: String,
    },
}

impl PaymentMethod {
    pub fn kind(&self) -> &'static str {
        match self {
            PaymentMethod::Card { .. } => "card",
            PaymentMethod::SavedCard { .. } => "saved_card",
            PaymentMethod::RedirectWallet { .. } => "redirect_wallet",
            PaymentMethod::ClientToken { .. } => "client_token",
        }
    }

    pub fn wallet_source_id(&self) -> Option<&str> {
        match self {
            PaymentMethod::RedirectWallet { source_id, .. } => source_id.as_deref(),
            _ => None,
        }
    }

    /// True once the wallet provider has sent the customer back for a source
    /// created by an earlier attempt.
    pub fn is_redirect_acknowledged(&self) -> bool {
        matches!(
            self,
            PaymentMethod::RedirectWallet {
                source_id: Some(_),
                acknowledged: true,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD_JSON: &str = r#"{
        "type": "card",
        "card": {"number": "4242424242424242", "exp_month": 12, "exp_year": 2030, "cvc": "123"},
        "save": true
    }"#;

    #[test]
    fn never_serializes_raw_card_fields() {
        let method: PaymentMethod = serde_json::from_str(CARD_JSON).unwrap();
        let stored = serde_json::to_string(&method).unwrap();

        assert!(!stored.contains("4242424242424242"));
        assert!(!stored.contains("123\""));
        assert_eq!(stored, r#"{"type":"card","save":true}"#);
    }

    #[test]
    fn redacts_card_number_in_debug_output() {
        let method: PaymentMethod = serde_json::from_str(CARD_JSON).unwrap();
        let debug = format!("{method:?}");

        assert!(debug.contains("**** 4242"));
        assert!(!debug.contains("4242424242424242"));
    }

    #[test]
    fn reads_stored_card_method_without_details() {
        let method: PaymentMethod = serde_json::from_str(r#"{"type":"card","save":true}"#).unwrap();

        assert!(matches!(method, PaymentMethod::Card { card: None, save: true }));
    }

    #[test]
    fn recognises_acknowledged_redirects() {
        let pending = PaymentMethod::RedirectWallet {
            wallet: "alipay".to_string(),
            source_id: Some("src_1".to_string()),
            acknowledged: false,
        };
        assert!(!pending.is_redirect_acknowledged());
        assert_eq!(pending.wallet_source_id(), Some("src_1"));

        let returned = PaymentMethod::RedirectWallet {
            wallet: "alipay".to_string(),
            source_id: Some("src_1".to_string()),
            acknowledged: true,
        };
        assert!(returned.is_redirect_acknowledged());
    }
}
