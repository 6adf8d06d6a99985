pub mod billing_profiles;
pub mod invoices;
pub mod orders;
pub mod payments;
pub mod products;
pub mod subscriptions;
