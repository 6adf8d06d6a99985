pub mod charge_orchestrator;
pub mod payment_guard;
pub mod payment_methods;
pub mod payments;
pub mod source_resolver;
pub mod subscriptions;
