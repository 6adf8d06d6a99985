use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Physical,
    Digital,
    Subscription,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Physical => "physical",
            ProductType::Digital => "digital",
            ProductType::Subscription => "subscription",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "physical" => Some(ProductType::Physical),
            "digital" => Some(ProductType::Digital),
            "subscription" => Some(ProductType::Subscription),
            _ => None,
        }
    }

    pub fn is_recurring(&self) -> bool {
        matches!(self, ProductType::Subscription)
    }
}

impl Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
