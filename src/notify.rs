//! Notification dispatch. Critical and emergency alerts are pushed to an
//! external sink, best-effort and asynchronous, with at-least-once
//! redelivery. Every dispatch carries the alert id as idempotency key so
//! downstream consumers can deduplicate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{Alert, Severity};
use crate::error::{AnalysisError, AnalysisResult};

const DISPATCH_ATTEMPTS: u32 = 3;
const DISPATCH_BACKOFF_MS: u64 = 100;

/// Payload handed to the notification sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertNotification {
    /// Equal to the alert id; receivers deduplicate on this.
    pub idempotency_key: Uuid,
    pub farm_id: String,
    pub field_id: String,
    pub kind: String,
    pub severity: Severity,
    pub headline: String,
    pub body: String,
}

impl From<&Alert> for AlertNotification {
    fn from(alert: &Alert) -> Self {
        let core = alert.core();
        let headline = format!(
            "{:?} {} alert on field {}",
            core.severity,
            core.kind.label(),
            core.field_id
        );
        let body = match core.estimated_loss_usd {
            Some(loss) => format!(
                "{:.0}% of the field affected; estimated loss ${loss:.2}",
                core.affected_area_pct
            ),
            None => format!("{:.0}% of the field affected", core.affected_area_pct),
        };
        Self {
            idempotency_key: core.id,
            farm_id: core.farm_id.clone(),
            field_id: core.field_id.clone(),
            kind: core.kind.label().to_string(),
            severity: core.severity,
            headline,
            body,
        }
    }
}

/// External notification capability (email, SMS, push).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn dispatch(&self, notification: &AlertNotification) -> AnalysisResult<()>;
}

/// Default sink: structured log lines only.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn dispatch(&self, notification: &AlertNotification) -> AnalysisResult<()> {
        info!(
            idempotency_key = %notification.idempotency_key,
            farm_id = %notification.farm_id,
            field_id = %notification.field_id,
            kind = %notification.kind,
            severity = ?notification.severity,
            "alert notification"
        );
        Ok(())
    }
}

/// Queue-backed dispatcher. Notifications are delivered by a background
/// worker; a delivery that keeps failing lands in the redelivery backlog
/// instead of failing the alert.
pub struct NotificationDispatcher {
    tx: mpsc::UnboundedSender<AlertNotification>,
    failed: Arc<Mutex<Vec<AlertNotification>>>,
}

impl NotificationDispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<AlertNotification>();
        let failed: Arc<Mutex<Vec<AlertNotification>>> = Arc::new(Mutex::new(Vec::new()));

        let worker_failed = failed.clone();
        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                if let Err(e) = deliver(sink.as_ref(), &notification).await {
                    error!(
                        idempotency_key = %notification.idempotency_key,
                        error = %e,
                        "notification delivery exhausted retries, queued for re-dispatch"
                    );
                    worker_failed.lock().await.push(notification);
                }
            }
        });

        Self { tx, failed }
    }

    /// Enqueue an alert for asynchronous delivery.
    pub fn enqueue(&self, alert: &Alert) -> AnalysisResult<()> {
        self.tx
            .send(AlertNotification::from(alert))
            .map_err(|_| AnalysisError::notification("dispatcher worker is gone"))
    }

    /// Re-enqueue everything in the redelivery backlog.
    pub async fn retry_failed(&self) -> AnalysisResult<usize> {
        let mut backlog = self.failed.lock().await;
        let count = backlog.len();
        for notification in backlog.drain(..) {
            self.tx
                .send(notification)
                .map_err(|_| AnalysisError::notification("dispatcher worker is gone"))?;
        }
        Ok(count)
    }

    /// Current redelivery backlog size.
    pub async fn failed_count(&self) -> usize {
        self.failed.lock().await.len()
    }
}

async fn deliver(
    sink: &dyn NotificationSink,
    notification: &AlertNotification,
) -> AnalysisResult<()> {
    let mut attempt = 0;
    loop {
        match sink.dispatch(notification).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                attempt += 1;
                if attempt >= DISPATCH_ATTEMPTS {
                    return Err(e);
                }
                let backoff = DISPATCH_BACKOFF_MS * 2_u64.pow(attempt - 1);
                warn!(
                    idempotency_key = %notification.idempotency_key,
                    attempt,
                    backoff_ms = backoff,
                    error = %e,
                    "notification dispatch failed, retrying"
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
        }
    }
}
