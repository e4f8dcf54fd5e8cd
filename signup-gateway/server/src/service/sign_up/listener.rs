use std::{future::Future, sync::Arc, time::Duration};

use futures::{Stream, StreamExt};
use snafu::ResultExt;
use sqlx::{postgres::PgListener, PgPool};
use tokio::{sync::Semaphore, task::JoinSet};

use super::{Delivery, Dispatch};
use crate::service::error::{self, Result};

const DEFAULT_MAX_CONCURRENT_DELIVERIES: usize = 16;
const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(60);
const RECEIVE_ERROR_PAUSE: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug)]
struct Limits {
    max_concurrent_deliveries: usize,
    delivery_timeout: Duration,
    receive_error_pause: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_concurrent_deliveries: DEFAULT_MAX_CONCURRENT_DELIVERIES,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            receive_error_pause: RECEIVE_ERROR_PAUSE,
        }
    }
}

/// Owns the `LISTEN` connection of the sign-up channel.
pub struct SignUpListener {
    listener: PgListener,
    channel: String,
    limits: Limits,
}

impl SignUpListener {
    /// Opens a dedicated connection with the options of `database` and
    /// subscribes to `channel`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or the `LISTEN` fails.
    #[tracing::instrument(skip(database))]
    pub async fn connect(database: &PgPool, channel: &str) -> Result<Self> {
        let mut listener =
            PgListener::connect_with(database).await.context(error::ConnectListenerSnafu)?;
        listener.listen(channel).await.context(error::ListenChannelSnafu { channel })?;

        tracing::info!("Listening for sign-up notifications");

        Ok(Self { listener, channel: channel.to_string(), limits: Limits::default() })
    }

    #[must_use]
    pub fn with_limits(mut self, max_concurrent_deliveries: usize, delivery_timeout: Duration) -> Self {
        self.limits.max_concurrent_deliveries = max_concurrent_deliveries.max(1);
        self.limits.delivery_timeout = delivery_timeout;
        self
    }

    /// Dispatches notifications until `shutdown` resolves, then waits for the
    /// deliveries in flight.
    pub async fn run<D, S>(self, dispatcher: D, shutdown: S)
    where
        D: Dispatch + 'static,
        S: Future<Output = ()> + Send,
    {
        let Self { listener, channel, limits } = self;
        let payloads = listener
            .into_stream()
            .map(|notification| notification.map(|notification| notification.payload().to_string()));

        serve(payloads, Arc::new(dispatcher), limits, &channel, shutdown).await;
        tracing::info!(channel = %channel, "Sign-up listener is stopped");
    }
}

/// Receive loop over the payloads of one channel. A receive error pauses the
/// loop before the next receive, which reconnects.
async fn serve<N, D, S>(payloads: N, dispatcher: Arc<D>, limits: Limits, channel: &str, shutdown: S)
where
    N: Stream<Item = std::result::Result<String, sqlx::Error>> + Send,
    D: Dispatch + ?Sized + 'static,
    S: Future<Output = ()> + Send,
{
    let permits = Arc::new(Semaphore::new(limits.max_concurrent_deliveries));
    let mut deliveries = JoinSet::new();
    tokio::pin!(payloads);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            Some(result) = deliveries.join_next(), if !deliveries.is_empty() => {
                if let Err(err) = result {
                    tracing::error!("Delivery task failed, error: {err}");
                }
            }
            payload = payloads.next() => match payload {
                Some(Ok(payload)) => {
                    let permit = tokio::select! {
                        () = &mut shutdown => break,
                        permit = Arc::clone(&permits).acquire_owned() => match permit {
                            Ok(permit) => permit,
                            Err(_) => break,
                        },
                    };
                    let dispatcher = Arc::clone(&dispatcher);
                    let timeout = limits.delivery_timeout;
                    let _handle = deliveries.spawn(async move {
                        deliver(&*dispatcher, &payload, timeout).await;
                        drop(permit);
                    });
                }
                Some(Err(err)) => {
                    tracing::error!(
                        channel = %channel,
                        "Fail to receive sign-up notification, error: {err}"
                    );
                    tokio::select! {
                        () = &mut shutdown => break,
                        () = tokio::time::sleep(limits.receive_error_pause) => {}
                    }
                }
                None => {
                    tracing::warn!(channel = %channel, "Sign-up notification stream is closed");
                    break;
                }
            }
        }
    }

    if !deliveries.is_empty() {
        tracing::info!("Waiting for {} activation email deliveries", deliveries.len());
    }
    while let Some(result) = deliveries.join_next().await {
        if let Err(err) = result {
            tracing::error!("Delivery task failed, error: {err}");
        }
    }
}

async fn deliver<D>(dispatcher: &D, payload: &str, timeout: Duration)
where
    D: Dispatch + ?Sized,
{
    match tokio::time::timeout(timeout, dispatcher.dispatch(payload)).await {
        Ok(Ok(Delivery { user_id, to, attempts })) => {
            tracing::info!(user_id = %user_id, to = %to, attempts, "Activation email delivered");
        }
        Ok(Err(err)) if err.is_data_error() => {
            tracing::warn!("Drop sign-up notification, {err}");
        }
        Ok(Err(err)) => tracing::error!("Drop sign-up notification, {err}"),
        Err(_) => {
            dispatcher.record_timeout();
            tracing::error!("Drop sign-up notification, delivery timed out after {timeout:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use async_trait::async_trait;
    use futures::channel::{mpsc, oneshot};

    use super::*;
    use crate::service::Error;

    #[derive(Default)]
    struct Recorder {
        delay: Duration,
        active: AtomicUsize,
        max_active: AtomicUsize,
        delivered: Mutex<Vec<String>>,
        timeouts: AtomicUsize,
    }

    impl Recorder {
        fn with_delay(delay: Duration) -> Arc<Self> { Arc::new(Self { delay, ..Self::default() }) }

        fn delivered(&self) -> Vec<String> { self.delivered.lock().unwrap().clone() }
    }

    #[async_trait]
    impl Dispatch for Recorder {
        async fn dispatch(&self, payload: &str) -> crate::service::Result<Delivery> {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            let _previous = self.max_active.fetch_max(active, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let _previous = self.active.fetch_sub(1, Ordering::SeqCst);

            if payload == "unknown" {
                return Err(Error::UserNotFound { user_id: payload.to_string() });
            }
            self.delivered.lock().unwrap().push(payload.to_string());
            Ok(Delivery { user_id: payload.to_string(), to: format!("{payload}@example.com"), attempts: 1 })
        }

        fn record_timeout(&self) { let _previous = self.timeouts.fetch_add(1, Ordering::SeqCst); }
    }

    type Sender = mpsc::UnboundedSender<std::result::Result<String, sqlx::Error>>;

    fn limits(max_concurrent_deliveries: usize, delivery_timeout: Duration) -> Limits {
        Limits {
            max_concurrent_deliveries,
            delivery_timeout,
            receive_error_pause: Duration::from_millis(20),
        }
    }

    /// Spawns the receive loop and returns the payload sender, the shutdown
    /// trigger and the loop handle.
    fn spawn_serve(
        recorder: &Arc<Recorder>,
        limits: Limits,
    ) -> (Sender, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
        let (payloads, receiver) = mpsc::unbounded();
        let (stop, stopped) = oneshot::channel::<()>();
        let recorder = Arc::clone(recorder);
        let handle = tokio::spawn(async move {
            serve(receiver, recorder, limits, "sign_ups", async move {
                let _result = stopped.await;
            })
            .await;
        });
        (payloads, stop, handle)
    }

    fn send(payloads: &Sender, payload: &str) { payloads.unbounded_send(Ok(payload.to_string())).unwrap(); }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let recorder = Recorder::with_delay(Duration::from_millis(30));
        let (payloads, stop, handle) = spawn_serve(&recorder, limits(2, Duration::from_secs(5)));

        for user in ["ada", "grace", "alan", "edsger", "barbara"] {
            send(&payloads, user);
        }
        tokio::time::sleep(Duration::from_millis(400)).await;
        stop.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(recorder.delivered().len(), 5);
        assert_eq!(recorder.max_active.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_slow_delivery_times_out() {
        let recorder = Recorder::with_delay(Duration::from_millis(500));
        let (payloads, stop, handle) = spawn_serve(&recorder, limits(4, Duration::from_millis(20)));

        send(&payloads, "ada");
        tokio::time::sleep(Duration::from_millis(150)).await;
        stop.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(recorder.timeouts.load(Ordering::SeqCst), 1);
        assert!(recorder.delivered().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_deliveries_in_flight() {
        let recorder = Recorder::with_delay(Duration::from_millis(100));
        let (payloads, stop, handle) = spawn_serve(&recorder, limits(4, Duration::from_secs(5)));

        send(&payloads, "ada");
        send(&payloads, "grace");
        tokio::time::sleep(Duration::from_millis(20)).await;
        stop.send(()).unwrap();
        handle.await.unwrap();

        let mut delivered = recorder.delivered();
        delivered.sort();
        assert_eq!(delivered, ["ada", "grace"]);
    }

    #[tokio::test]
    async fn test_shutdown_does_not_wait_for_a_permit() {
        let recorder = Recorder::with_delay(Duration::from_millis(300));
        let (payloads, stop, handle) = spawn_serve(&recorder, limits(1, Duration::from_secs(5)));

        send(&payloads, "ada");
        send(&payloads, "grace");
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();

        // the queued notification never got a permit
        assert_eq!(recorder.delivered(), ["ada"]);
    }

    #[tokio::test]
    async fn test_receive_error_pauses_then_continues() {
        let recorder = Recorder::with_delay(Duration::ZERO);
        let (payloads, stop, handle) = spawn_serve(&recorder, limits(4, Duration::from_secs(5)));

        payloads.unbounded_send(Err(sqlx::Error::PoolTimedOut)).unwrap();
        send(&payloads, "ada");
        tokio::time::sleep(Duration::from_millis(150)).await;
        stop.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(recorder.delivered(), ["ada"]);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_receive_error_pause() {
        let recorder = Recorder::with_delay(Duration::ZERO);
        let (payloads, receiver) = mpsc::unbounded();
        let limits = Limits { receive_error_pause: Duration::from_secs(30), ..limits(4, Duration::from_secs(5)) };

        payloads.unbounded_send(Err(sqlx::Error::PoolTimedOut)).unwrap();
        let served = tokio::time::timeout(
            Duration::from_secs(2),
            serve(receiver, recorder, limits, "sign_ups", tokio::time::sleep(Duration::from_millis(50))),
        )
        .await;

        assert!(served.is_ok());
    }

    #[tokio::test]
    async fn test_data_errors_do_not_stop_the_listener() {
        let recorder = Recorder::with_delay(Duration::ZERO);
        let (payloads, stop, handle) = spawn_serve(&recorder, limits(4, Duration::from_secs(5)));

        send(&payloads, "unknown");
        send(&payloads, "ada");
        tokio::time::sleep(Duration::from_millis(100)).await;
        stop.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(recorder.delivered(), ["ada"]);
    }

    #[tokio::test]
    async fn test_closed_stream_ends_the_loop() {
        let recorder = Recorder::with_delay(Duration::ZERO);
        let (payloads, receiver) = mpsc::unbounded();
        send(&payloads, "ada");
        drop(payloads);

        let served = tokio::time::timeout(
            Duration::from_secs(2),
            serve(receiver, Arc::clone(&recorder), limits(4, Duration::from_secs(5)), "sign_ups", future_pending()),
        )
        .await;

        assert!(served.is_ok());
        assert_eq!(recorder.delivered(), ["ada"]);
    }

    fn future_pending() -> impl Future<Output = ()> + Send { std::future::pending() }
}
