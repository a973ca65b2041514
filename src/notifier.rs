//! Fire-and-forget signalling of network-origin changes.

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;

use crate::types::{ClientFingerprint, NetworkOrigin, SubjectId};

/// A refresh arrived from a different network origin than the session's last one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OriginChange {
    pub subject: SubjectId,
    pub previous_origin: NetworkOrigin,
    pub current_origin: NetworkOrigin,
    pub client_fingerprint: ClientFingerprint,
    #[serde(with = "time::serde::rfc3339")]
    pub detected_at: OffsetDateTime,
}

/// Receiver of origin-change anomalies.
///
/// `notify` must return promptly and must not fail: implementations that do
/// I/O hand the event off (e.g. to a spawned task) and log their own errors.
pub trait AnomalyNotifier: Send + Sync + 'static {
    fn notify(&self, event: OriginChange);
}

impl<T: AnomalyNotifier + ?Sized> AnomalyNotifier for Arc<T> {
    fn notify(&self, event: OriginChange) {
        (**self).notify(event);
    }
}

impl<T: AnomalyNotifier + ?Sized> AnomalyNotifier for Box<T> {
    fn notify(&self, event: OriginChange) {
        (**self).notify(event);
    }
}

/// Reports anomalies as `warn` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl AnomalyNotifier for TracingNotifier {
    fn notify(&self, event: OriginChange) {
        tracing::warn!(
            subject = %event.subject,
            previous_origin = %event.previous_origin,
            current_origin = %event.current_origin,
            "Session used from a new network origin"
        );
    }
}

#[cfg(feature = "webhook")]
pub use webhook::WebhookNotifier;

#[cfg(feature = "webhook")]
mod webhook {
    use url::Url;

    use super::{AnomalyNotifier, OriginChange};

    /// POSTs each anomaly as JSON to a webhook endpoint.
    ///
    /// Delivery runs on a spawned tokio task; failures are logged and dropped.
    #[derive(Debug, Clone)]
    pub struct WebhookNotifier {
        http: reqwest::Client,
        url: Url,
    }

    impl WebhookNotifier {
        #[must_use]
        pub fn new(url: Url) -> Self {
            Self {
                http: reqwest::Client::new(),
                url,
            }
        }

        /// Use a custom HTTP client (for connection pool reuse or testing).
        #[must_use]
        pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
            self.http = client;
            self
        }

        #[must_use]
        pub fn url(&self) -> &Url {
            &self.url
        }
    }

    impl AnomalyNotifier for WebhookNotifier {
        fn notify(&self, event: OriginChange) {
            let Ok(handle) = tokio::runtime::Handle::try_current() else {
                tracing::warn!(
                    subject = %event.subject,
                    "No async runtime, origin change webhook dropped"
                );
                return;
            };

            let http = self.http.clone();
            let url = self.url.clone();
            handle.spawn(async move {
                let result = http
                    .post(url)
                    .json(&event)
                    .send()
                    .await
                    .and_then(reqwest::Response::error_for_status);
                match result {
                    Ok(_) => tracing::info!(subject = %event.subject, "Origin change webhook sent"),
                    Err(e) => {
                        tracing::warn!(subject = %event.subject, error = %e, "Origin change webhook failed");
                    }
                }
            });
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;

    use super::{AnomalyNotifier, OriginChange};

    /// Records every event it receives.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingNotifier {
        events: Mutex<Vec<OriginChange>>,
    }

    impl RecordingNotifier {
        pub(crate) fn events(&self) -> Vec<OriginChange> {
            self.events.lock().clone()
        }
    }

    impl AnomalyNotifier for RecordingNotifier {
        fn notify(&self, event: OriginChange) {
            self.events.lock().push(event);
        }
    }
}
