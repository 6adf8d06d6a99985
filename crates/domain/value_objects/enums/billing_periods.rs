use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BillingPeriod {
    Weekly,
    Monthly,
    Quarterly,
    #[serde(alias = "biannual")]
    Biannually,
    #[serde(alias = "annual")]
    Annually,
}

/// Unit the gateway counts recurring intervals in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanInterval {
    Week,
    Month,
    Year,
}

impl PlanInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanInterval::Week => "week",
            PlanInterval::Month => "month",
            PlanInterval::Year => "year",
        }
    }
}

impl BillingPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingPeriod::Weekly => "weekly",
            BillingPeriod::Monthly => "monthly",
            BillingPeriod::Quarterly => "quarterly",
            BillingPeriod::Biannually => "biannually",
            BillingPeriod::Annually => "annually",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "weekly" => Some(BillingPeriod::Weekly),
            "monthly" => Some(BillingPeriod::Monthly),
            "quarterly" => Some(BillingPeriod::Quarterly),
            "biannually" | "biannual" => Some(BillingPeriod::Biannually),
            "annually" | "annual" => Some(BillingPeriod::Annually),
            _ => None,
        }
    }

    /// Interval unit and count the gateway plan is created with.
    pub fn interval(&self) -> (PlanInterval, u32) {
        match self {
            BillingPeriod::Weekly => (PlanInterval::Week, 1),
            BillingPeriod::Monthly => (PlanInterval::Month, 1),
            BillingPeriod::Quarterly => (PlanInterval::Month, 3),
            BillingPeriod::Biannually => (PlanInterval::Month, 6),
            BillingPeriod::Annually => (PlanInterval::Year, 1),
        }
    }
}

impl Display for BillingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
