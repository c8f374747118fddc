//! Run-outcome notification dispatch.
//!
//! [`NotificationDispatcher`] resolves an endpoint for a message's routing
//! key and delivers it. Delivery failures are logged and swallowed; a
//! disabled dispatcher does nothing and still reports success.

use std::sync::Arc;

use loadctl_core::notification::NotificationMessage;

use crate::bus::LogBroker;
use crate::delivery::routes::WebhookRoutes;
use crate::delivery::webhook::{WebhookDelivery, WebhookError};

/// Static notification settings, read once at startup.
#[derive(Debug, Clone, Default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub routes: WebhookRoutes,
}

impl NotificationConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            routes: WebhookRoutes::default(),
        }
    }
}

/// What happened to a notification. Informational only; callers never
/// need to act on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    Disabled,
    NoEndpoint,
    Delivered,
    Failed,
}

/// Sends run-outcome messages to routing-key-selected webhooks.
pub struct NotificationDispatcher {
    config: NotificationConfig,
    delivery: WebhookDelivery,
    broker: Arc<LogBroker>,
}

impl NotificationDispatcher {
    pub fn new(config: NotificationConfig, broker: Arc<LogBroker>) -> Result<Self, WebhookError> {
        Ok(Self::with_delivery(config, WebhookDelivery::new()?, broker))
    }

    /// Use a pre-built delivery service (e.g. with a shorter retry schedule).
    pub fn with_delivery(
        config: NotificationConfig,
        delivery: WebhookDelivery,
        broker: Arc<LogBroker>,
    ) -> Self {
        Self {
            config,
            delivery,
            broker,
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Deliver `message` to the endpoint for `routing_key`.
    ///
    /// Never fails: every outcome is logged and returned for inspection.
    pub async fn notify(&self, message: &NotificationMessage, routing_key: &str) -> DispatchResult {
        if !self.config.enabled {
            tracing::debug!(routing_key, "Notifications disabled, skipping");
            return DispatchResult::Disabled;
        }

        let Some(url) = self.config.routes.resolve(Some(routing_key)) else {
            self.broker.warn(format!(
                "No notification endpoint configured for '{routing_key}', skipping notification"
            ));
            return DispatchResult::NoEndpoint;
        };

        match self.delivery.deliver(url, &message.to_markdown()).await {
            Ok(()) => {
                self.broker.info(format!(
                    "Notification sent for {} ({})",
                    message.test_name,
                    if message.succeeded() { "success" } else { "failure" }
                ));
                DispatchResult::Delivered
            }
            Err(e) => {
                self.broker
                    .error(format!("Failed to send notification for {}: {e}", message.test_name));
                DispatchResult::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use loadctl_core::notification::RunOutcomeKind;

    use super::*;

    fn message() -> NotificationMessage {
        let now = chrono::Utc::now();
        NotificationMessage {
            test_name: "checkout-20Vuser".into(),
            test_plan: "checkout".into(),
            actual_users: 20,
            started_at: now,
            finished_at: now,
            outcome: RunOutcomeKind::Failed {
                exit_code: 1,
                engine_log: "log/report-20_1.log".into(),
            },
        }
    }

    #[tokio::test]
    async fn disabled_dispatcher_is_a_noop() {
        let config = NotificationConfig {
            enabled: false,
            routes: WebhookRoutes::parse(None, "checkout=http://127.0.0.1:9/hook").unwrap(),
        };
        let dispatcher =
            NotificationDispatcher::new(config, Arc::new(LogBroker::default())).unwrap();

        assert_eq!(dispatcher.notify(&message(), "checkout").await, DispatchResult::Disabled);
    }

    #[tokio::test]
    async fn missing_endpoint_is_logged_not_sent() {
        let broker = Arc::new(LogBroker::default());
        let mut rx = broker.subscribe();
        let config = NotificationConfig {
            enabled: true,
            routes: WebhookRoutes::default(),
        };
        let dispatcher = NotificationDispatcher::new(config, Arc::clone(&broker)).unwrap();

        assert_eq!(dispatcher.notify(&message(), "checkout").await, DispatchResult::NoEndpoint);
        assert!(rx.recv().await.unwrap().message.contains("No notification endpoint"));
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed() {
        let broker = Arc::new(LogBroker::default());
        let config = NotificationConfig {
            enabled: true,
            routes: WebhookRoutes::parse(Some("http://127.0.0.1:9/hook".into()), "").unwrap(),
        };
        let delivery = WebhookDelivery::new().unwrap().with_retry_delays(Vec::new());
        let dispatcher = NotificationDispatcher::with_delivery(config, delivery, broker);

        assert_eq!(dispatcher.notify(&message(), "checkout").await, DispatchResult::Failed);
    }
}
