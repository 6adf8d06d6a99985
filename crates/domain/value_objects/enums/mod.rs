pub mod billing_periods;
pub mod product_types;
pub mod subscription_statuses;
