use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use notification::{Notification, NotificationClient};
use signup_gateway_server::{
    metrics::SignUpMetrics,
    service::{
        self,
        sign_up::{Delivery, RetryPolicy, SignUpDispatcher, UserDirectory, UserRecord},
    },
};

#[derive(Default)]
struct Directory {
    users: HashMap<String, Vec<UserRecord>>,
}

impl Directory {
    fn with(mut self, user_id: &str, names: &[(&str, &str)]) -> Self {
        let records = names
            .iter()
            .map(|(first_name, last_name)| UserRecord {
                first_name: (*first_name).to_string(),
                last_name: (*last_name).to_string(),
            })
            .collect();
        drop(self.users.insert(user_id.to_string(), records));
        self
    }
}

#[async_trait]
impl UserDirectory for Directory {
    async fn find_users(&self, user_id: &str) -> service::Result<Vec<UserRecord>> {
        Ok(self.users.get(user_id).cloned().unwrap_or_default())
    }
}

/// Records every submission and fails the first `failures` of them.
struct Outbox {
    sent: Mutex<Vec<Notification>>,
    failures: Mutex<u32>,
    status: u16,
    delay: Duration,
}

impl Outbox {
    fn new() -> Self { Self::failing(0, 503) }

    fn failing(failures: u32, status: u16) -> Self {
        Self { sent: Mutex::default(), failures: Mutex::new(failures), status, delay: Duration::ZERO }
    }

    fn sent(&self) -> Vec<Notification> { self.sent.lock().unwrap().clone() }
}

#[async_trait]
impl NotificationClient for Outbox {
    async fn send_notification(&self, notification: &Notification) -> Result<(), notification::Error> {
        tokio::time::sleep(self.delay).await;
        self.sent.lock().unwrap().push(notification.clone());

        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(notification::Error::SendEmail {
                status: self.status,
                message: "try again later".to_string(),
            });
        }
        Ok(())
    }
}

fn retry_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
    }
}

fn dispatcher(directory: Directory, outbox: &Arc<Outbox>, max_attempts: u32) -> (SignUpDispatcher, SignUpMetrics) {
    let metrics = SignUpMetrics::unregistered().unwrap();
    let dispatcher = SignUpDispatcher::new(
        Arc::new(directory),
        Arc::clone(outbox) as Arc<dyn NotificationClient>,
        retry_policy(max_attempts),
        metrics.clone(),
    );
    (dispatcher, metrics)
}

fn payload(user_id: &str, email: &str, code: &str) -> String {
    serde_json::json!({ "user_id": user_id, "email": email, "activation_code": code }).to_string()
}

#[tokio::test]
async fn test_single_match_sends_one_email() {
    let outbox = Arc::new(Outbox::new());
    let (dispatcher, metrics) =
        dispatcher(Directory::default().with("7", &[("Ada", "Lovelace")]), &outbox, 3);

    let delivery = dispatcher.dispatch(&payload("7", "ada@example.com", "C0DE")).await.unwrap();

    assert_eq!(
        delivery,
        Delivery { user_id: "7".to_string(), to: "ada@example.com".to_string(), attempts: 1 }
    );
    assert_eq!(
        outbox.sent(),
        [Notification::ActivationEmail {
            to: "ada@example.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            activation_code: "C0DE".to_string(),
        }]
    );
    assert_eq!(metrics.received.get(), 1);
    assert_eq!(metrics.delivered.get(), 1);
}

#[tokio::test]
async fn test_numeric_user_id_is_looked_up_as_text() {
    let outbox = Arc::new(Outbox::new());
    let (dispatcher, _metrics) =
        dispatcher(Directory::default().with("42", &[("Grace", "Hopper")]), &outbox, 1);

    let payload = r#"{"user_id": 42, "email": "grace@example.com", "activation_code": "x"}"#;
    let _delivery = dispatcher.dispatch(payload).await.unwrap();

    assert_eq!(outbox.sent().len(), 1);
}

#[tokio::test]
async fn test_zero_or_many_users_send_nothing() {
    let outbox = Arc::new(Outbox::new());
    let directory = Directory::default().with("dup", &[("Ada", "Lovelace"), ("Ada", "Byron")]);
    let (dispatcher, metrics) = dispatcher(directory, &outbox, 3);

    let err = dispatcher.dispatch(&payload("missing", "a@example.com", "1")).await.unwrap_err();
    assert!(matches!(err, service::Error::UserNotFound { .. }));
    assert!(err.is_data_error());

    let err = dispatcher.dispatch(&payload("dup", "a@example.com", "1")).await.unwrap_err();
    assert!(matches!(err, service::Error::AmbiguousUser { count: 2, .. }));
    assert!(err.is_data_error());

    assert!(outbox.sent().is_empty());
    assert_eq!(metrics.dropped.with_label_values(&["user_not_found"]).get(), 1);
    assert_eq!(metrics.dropped.with_label_values(&["ambiguous_user"]).get(), 1);
}

#[tokio::test]
async fn test_malformed_payload_is_dropped() {
    let outbox = Arc::new(Outbox::new());
    let (dispatcher, metrics) = dispatcher(Directory::default(), &outbox, 3);

    let err = dispatcher.dispatch("{\"user_id\": ").await.unwrap_err();

    assert!(matches!(err, service::Error::MalformedPayload { .. }));
    assert!(outbox.sent().is_empty());
    assert_eq!(metrics.dropped.with_label_values(&["malformed_payload"]).get(), 1);
}

#[tokio::test]
async fn test_concurrent_notifications_are_independent() {
    let mut outbox = Outbox::new();
    outbox.delay = Duration::from_millis(20);
    let outbox = Arc::new(outbox);
    let directory =
        Directory::default().with("1", &[("Ada", "Lovelace")]).with("2", &[("Alan", "Turing")]);
    let (dispatcher, _metrics) = dispatcher(directory, &outbox, 1);

    let first = payload("1", "ada@example.com", "AAAA");
    let second = payload("2", "alan@example.com", "BBBB");
    let (first, second) = tokio::join!(dispatcher.dispatch(&first), dispatcher.dispatch(&second));
    assert_eq!(first.unwrap().to, "ada@example.com");
    assert_eq!(second.unwrap().to, "alan@example.com");

    let sent = outbox.sent();
    assert_eq!(sent.len(), 2);
    for notification in sent {
        let Notification::ActivationEmail { to, first_name, activation_code, .. } = notification;
        match to.as_str() {
            "ada@example.com" => {
                assert_eq!(first_name, "Ada");
                assert_eq!(activation_code, "AAAA");
            }
            "alan@example.com" => {
                assert_eq!(first_name, "Alan");
                assert_eq!(activation_code, "BBBB");
            }
            other => panic!("unexpected recipient {other}"),
        }
    }
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let outbox = Arc::new(Outbox::failing(2, 503));
    let (dispatcher, metrics) =
        dispatcher(Directory::default().with("7", &[("Ada", "Lovelace")]), &outbox, 3);

    let delivery = dispatcher.dispatch(&payload("7", "ada@example.com", "C0DE")).await.unwrap();

    assert_eq!(delivery.attempts, 3);
    assert_eq!(outbox.sent().len(), 3);
    assert_eq!(metrics.send_retries.get(), 2);
}

#[tokio::test]
async fn test_retries_stop_at_max_attempts() {
    let outbox = Arc::new(Outbox::failing(10, 429));
    let (dispatcher, metrics) =
        dispatcher(Directory::default().with("7", &[("Ada", "Lovelace")]), &outbox, 3);

    let err = dispatcher.dispatch(&payload("7", "ada@example.com", "C0DE")).await.unwrap_err();

    assert!(matches!(err, service::Error::SendActivationEmail { attempts: 3, .. }));
    assert!(!err.is_data_error());
    assert_eq!(outbox.sent().len(), 3);
    assert_eq!(metrics.dropped.with_label_values(&["send_failed"]).get(), 1);
}

#[tokio::test]
async fn test_permanent_failure_is_not_retried() {
    let outbox = Arc::new(Outbox::failing(1, 400));
    let (dispatcher, metrics) =
        dispatcher(Directory::default().with("7", &[("Ada", "Lovelace")]), &outbox, 5);

    let err = dispatcher.dispatch(&payload("7", "ada@example.com", "C0DE")).await.unwrap_err();

    assert!(matches!(err, service::Error::SendActivationEmail { attempts: 1, .. }));
    assert_eq!(outbox.sent().len(), 1);
    assert_eq!(metrics.send_retries.get(), 0);
}
