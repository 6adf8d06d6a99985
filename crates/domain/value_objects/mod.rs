pub mod enums;
pub mod money;
pub mod payment_errors;
pub mod payment_methods;
pub mod payments;
pub mod proration;
pub mod request_context;
pub mod subscriptions;
