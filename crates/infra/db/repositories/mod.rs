pub mod billing_profiles;
pub mod invoices;
pub mod locks;
pub mod orders;
pub mod payments;
pub mod products;
pub mod subscriptions;
