//! Webhook Module
//!
//! Subscription registry, signed delivery, and the periodic notification
//! dispatcher that watches tracked signatures for terminal states.

pub mod dispatcher;
pub mod registry;
pub mod sign;

// Re-exports for convenience
pub use dispatcher::{DeliveryError, HttpSender, NotificationDispatcher, NotificationSender};
pub use registry::{RegistryError, SubscriptionRegistry};
pub use sign::sign_payload;
