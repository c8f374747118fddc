//! External delivery of run-outcome notifications.
//!
//! [`routes::WebhookRoutes`] picks an endpoint for a routing key and
//! [`webhook::WebhookDelivery`] posts the rendered message to it.

pub mod routes;
pub mod webhook;
