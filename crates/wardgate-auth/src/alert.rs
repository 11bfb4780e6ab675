//! Login alerts: the dispatcher contract, bounded fan-out and the
//! background retry queue.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use wardgate_core::error::WardgateError;
use wardgate_core::models::user::User;

pub const LOGIN_ALERT_SUBJECT: &str = "New login detected";
pub const LOGIN_ALERT_TEMPLATE: &str = "multi-login-alert";

/// Pending retries beyond this are dropped with a warning.
const RETRY_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert transport failed: {0}")]
    Transport(String),

    #[error("alert delivery timed out after {0:?}")]
    Timeout(Duration),
}

impl From<AlertError> for WardgateError {
    fn from(err: AlertError) -> Self {
        WardgateError::AlertDelivery(err.to_string())
    }
}

/// Notification to an account owner that their account was signed into
/// from another device or address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginAlert {
    pub to: String,
    pub subject: String,
    pub template: String,
    pub account_name: String,
    /// `%Y-%m-%d %H:%M:%S`, UTC.
    pub time: String,
    pub device: String,
    pub ip: String,
}

impl LoginAlert {
    pub fn new_login(user: &User, at: DateTime<Utc>, device: &str, ip: &str) -> Self {
        Self {
            to: user.email.clone(),
            subject: LOGIN_ALERT_SUBJECT.into(),
            template: LOGIN_ALERT_TEMPLATE.into(),
            account_name: user.name.clone(),
            time: at.format("%Y-%m-%d %H:%M:%S").to_string(),
            device: device.into(),
            ip: ip.into(),
        }
    }
}

/// Delivers a single alert. Implementations wrap a mail or push
/// transport.
pub trait AlertDispatcher: Send + Sync + 'static {
    fn dispatch(
        &self,
        alert: &LoginAlert,
    ) -> impl Future<Output = Result<(), AlertError>> + Send;
}

/// Emits alerts as structured log events.
#[derive(Debug, Clone, Default)]
pub struct LogAlertDispatcher;

impl AlertDispatcher for LogAlertDispatcher {
    async fn dispatch(&self, alert: &LoginAlert) -> Result<(), AlertError> {
        info!(
            to = %alert.to,
            template = %alert.template,
            account = %alert.account_name,
            device = %alert.device,
            ip = %alert.ip,
            time = %alert.time,
            "{}",
            alert.subject
        );
        Ok(())
    }
}

async fn attempt<A: AlertDispatcher>(
    dispatcher: &A,
    alert: &LoginAlert,
    timeout: Duration,
) -> Result<(), AlertError> {
    match tokio::time::timeout(timeout, dispatcher.dispatch(alert)).await {
        Ok(result) => result,
        Err(_) => Err(AlertError::Timeout(timeout)),
    }
}

#[derive(Debug)]
struct RetryJob {
    alert: LoginAlert,
    /// Attempts already made.
    attempts: u32,
}

/// Handle for enqueueing failed alerts. The worker stops once every
/// handle is dropped.
#[derive(Debug, Clone)]
pub struct AlertRetryQueue {
    tx: mpsc::Sender<RetryJob>,
}

impl AlertRetryQueue {
    /// Returns `false` if the alert was dropped.
    fn enqueue(&self, alert: LoginAlert, attempts: u32) -> bool {
        match self.tx.try_send(RetryJob { alert, attempts }) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "alert retry queue rejected job");
                false
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per alert, the first inline one included.
    pub max_attempts: u32,
    /// The n-th retry waits `n * backoff`.
    pub backoff: Duration,
    /// Upper bound on one attempt.
    pub timeout: Duration,
}

/// Start the background redelivery worker.
pub fn spawn_retry_worker<A: AlertDispatcher>(
    dispatcher: Arc<A>,
    policy: RetryPolicy,
) -> (AlertRetryQueue, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<RetryJob>(RETRY_QUEUE_CAPACITY);

    let handle = tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            redeliver(dispatcher.as_ref(), job, &policy).await;
        }
    });

    (AlertRetryQueue { tx }, handle)
}

async fn redeliver<A: AlertDispatcher>(dispatcher: &A, job: RetryJob, policy: &RetryPolicy) {
    let RetryJob { alert, attempts } = job;

    for n in (attempts + 1)..=policy.max_attempts {
        tokio::time::sleep(policy.backoff * (n - 1)).await;
        match attempt(dispatcher, &alert, policy.timeout).await {
            Ok(()) => {
                info!(to = %alert.to, attempt = n, "alert delivered on retry");
                return;
            }
            Err(e) => warn!(to = %alert.to, attempt = n, error = %e, "alert retry failed"),
        }
    }

    error!(
        to = %alert.to,
        attempts = policy.max_attempts,
        "giving up on alert"
    );
}

/// Outcome of one fan-out round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    pub queued: usize,
}

/// Attempts every alert once, each bounded by a timeout. A failure never
/// stops the remaining deliveries.
pub struct AlertFanout<A: AlertDispatcher> {
    dispatcher: Arc<A>,
    timeout: Duration,
    retry: Option<AlertRetryQueue>,
}

impl<A: AlertDispatcher> Clone for AlertFanout<A> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            timeout: self.timeout,
            retry: self.retry.clone(),
        }
    }
}

impl<A: AlertDispatcher> AlertFanout<A> {
    pub fn new(dispatcher: Arc<A>, timeout: Duration) -> Self {
        Self {
            dispatcher,
            timeout,
            retry: None,
        }
    }

    pub fn with_retry_queue(mut self, queue: AlertRetryQueue) -> Self {
        self.retry = Some(queue);
        self
    }

    pub async fn deliver_all(&self, alerts: Vec<LoginAlert>) -> FanoutReport {
        let mut report = FanoutReport {
            attempted: alerts.len(),
            ..Default::default()
        };

        for alert in alerts {
            match attempt(self.dispatcher.as_ref(), &alert, self.timeout).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(to = %alert.to, error = %e, "alert delivery failed");
                    report.failed += 1;
                    if let Some(queue) = &self.retry {
                        if queue.enqueue(alert, 1) {
                            report.queued += 1;
                        }
                    }
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::TimeZone;
    use uuid::Uuid;
    use wardgate_core::models::user::UserType;

    use super::*;

    /// Fails the first `fail_first` calls, records every delivery after.
    #[derive(Default)]
    struct Flaky {
        fail_first: u32,
        calls: AtomicU32,
        delivered: Mutex<Vec<LoginAlert>>,
    }

    impl AlertDispatcher for Flaky {
        async fn dispatch(&self, alert: &LoginAlert) -> Result<(), AlertError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(AlertError::Transport("smtp down".into()));
            }
            self.delivered.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    struct Stalled;

    impl AlertDispatcher for Stalled {
        async fn dispatch(&self, _alert: &LoginAlert) -> Result<(), AlertError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            email: "a@x.com".into(),
            name: "Alice".into(),
            phone: None,
            password_hash: String::new(),
            user_type: UserType::Patient,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn alert() -> LoginAlert {
        LoginAlert::new_login(&user(), Utc::now(), "Safari/iPhone", "9.9.9.9")
    }

    #[test]
    fn login_alert_fields() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        let alert = LoginAlert::new_login(&user(), at, "Safari/iPhone", "9.9.9.9");

        assert_eq!(alert.to, "a@x.com");
        assert_eq!(alert.subject, "New login detected");
        assert_eq!(alert.template, "multi-login-alert");
        assert_eq!(alert.account_name, "Alice");
        assert_eq!(alert.time, "2024-03-05 07:08:09");
        assert_eq!(alert.device, "Safari/iPhone");
        assert_eq!(alert.ip, "9.9.9.9");
    }

    #[test]
    fn delivery_errors_map_to_alert_delivery() {
        let err: WardgateError = AlertError::Timeout(Duration::from_secs(2)).into();
        assert!(matches!(err, WardgateError::AlertDelivery(_)));
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_rest() {
        let dispatcher = Arc::new(Flaky {
            fail_first: 1,
            ..Default::default()
        });
        let fanout = AlertFanout::new(dispatcher.clone(), Duration::from_secs(1));

        let report = fanout.deliver_all(vec![alert(), alert(), alert()]).await;

        assert_eq!(report.attempted, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.queued, 0);
        assert_eq!(dispatcher.delivered.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_dispatch_is_cut_off() {
        let fanout = AlertFanout::new(Arc::new(Stalled), Duration::from_secs(2));
        let started = tokio::time::Instant::now();

        let report = fanout.deliver_all(vec![alert(), alert()]).await;

        assert_eq!(report.failed, 2);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(4) && elapsed < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_alert_is_redelivered_by_worker() {
        let dispatcher = Arc::new(Flaky {
            fail_first: 2,
            ..Default::default()
        });
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_secs(5),
            timeout: Duration::from_secs(1),
        };
        let (queue, worker) = spawn_retry_worker(dispatcher.clone(), policy);
        let fanout =
            AlertFanout::new(dispatcher.clone(), Duration::from_secs(1)).with_retry_queue(queue);

        let report = fanout.deliver_all(vec![alert()]).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.queued, 1);

        drop(fanout);
        worker.await.unwrap();

        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 3);
        assert_eq!(dispatcher.delivered.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn worker_gives_up_after_max_attempts() {
        let dispatcher = Arc::new(Flaky {
            fail_first: u32::MAX,
            ..Default::default()
        });
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(10),
            timeout: Duration::from_secs(1),
        };
        let (queue, worker) = spawn_retry_worker(dispatcher.clone(), policy);
        let fanout = AlertFanout::new(dispatcher.clone(), Duration::from_secs(1))
            .with_retry_queue(queue);

        fanout.deliver_all(vec![alert()]).await;
        drop(fanout);
        worker.await.unwrap();

        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 3);
        assert!(dispatcher.delivered.lock().unwrap().is_empty());
    }
}
