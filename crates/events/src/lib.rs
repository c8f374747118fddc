//! Live run-log fan-out and outcome notification delivery.
//!
//! - [`LogBroker`]: process-wide publish/subscribe hub for [`LogEntry`]s,
//!   backed by `tokio::sync::broadcast`.
//! - [`LogStream`]: one observer's view of the broker, yielding heartbeats
//!   while idle.
//! - [`NotificationDispatcher`]: routes a finished run's message to a
//!   webhook endpoint.
//!
//! [`LogEntry`]: loadctl_core::logging::LogEntry

pub mod bus;
pub mod delivery;
pub mod notifier;
pub mod stream;

pub use bus::LogBroker;
pub use delivery::routes::WebhookRoutes;
pub use delivery::webhook::{WebhookDelivery, WebhookError};
pub use notifier::{DispatchResult, NotificationConfig, NotificationDispatcher};
pub use stream::{LogStream, StreamEvent};
