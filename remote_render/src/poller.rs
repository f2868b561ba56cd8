/*
    One poller follows one job until the server reports COMPLETED or FAILED, or until the
    record disappears from the store. The poller never holds a reference to the record,
    only its id, and looks the record up again on every tick. Failed polls leave the
    record as it was and are retried after a longer pause, forever.
*/
use crate::{
    client::RenderServer,
    events::{EventSender, UiEvent},
    models::status::JobStatus,
    notify::{Notification, NotificationSink},
    store::SharedJobStore,
};
use std::{sync::Arc, time::Duration};
use tokio::task::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollerConfig {
    /// Pause between successful polls.
    pub interval: Duration,
    /// Pause after a failed poll.
    pub retry_interval: Duration,
    /// Whether COMPLETED jobs raise a notification. Failures always do.
    pub notify_on_success: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            retry_interval: Duration::from_secs(10),
            notify_on_success: true,
        }
    }
}

/// What a single poll did.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    /// Record updated, job still running.
    Updated(JobStatus),
    /// Poll failed; record untouched.
    Failed,
    /// Job reached COMPLETED or FAILED.
    Finished(JobStatus),
    /// Record no longer in the store.
    Vanished,
}

impl Tick {
    /// Pause before the next tick, or `None` when polling is over.
    pub fn next_delay(&self, config: &PollerConfig) -> Option<Duration> {
        match self {
            Tick::Updated(_) => Some(config.interval),
            Tick::Failed => Some(config.retry_interval),
            Tick::Finished(_) | Tick::Vanished => None,
        }
    }
}

pub struct JobPoller {
    job_id: String,
    store: SharedJobStore,
    server: Arc<dyn RenderServer>,
    sink: Arc<dyn NotificationSink>,
    events: EventSender,
    config: PollerConfig,
}

impl JobPoller {
    pub fn new(
        job_id: impl Into<String>,
        store: SharedJobStore,
        server: Arc<dyn RenderServer>,
        sink: Arc<dyn NotificationSink>,
        events: EventSender,
        config: PollerConfig,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            store,
            server,
            sink,
            events,
            config,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Run the poll loop on the tokio runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        tracing::debug!("Polling job {}", self.job_id);
        loop {
            let tick = self.tick().await;
            match tick.next_delay(&self.config) {
                Some(delay) => tokio::time::sleep(delay).await,
                None => break,
            }
        }
        tracing::debug!("Stopped polling job {}", self.job_id);
    }

    /// Poll once and fold the answer into the live record.
    pub async fn tick(&self) -> Tick {
        if !self.store.read().await.contains(&self.job_id) {
            return Tick::Vanished;
        }

        let server = Arc::clone(&self.server);
        let job_id = self.job_id.clone();
        let report = match task::spawn_blocking(move || server.job_status(&job_id)).await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                tracing::warn!(
                    "Polling job {} failed, retrying in {:?}: {e}",
                    self.job_id,
                    self.config.retry_interval
                );
                return Tick::Failed;
            }
            Err(e) => {
                tracing::warn!("Status request for job {} did not finish: {e}", self.job_id);
                return Tick::Failed;
            }
        };

        // the record may have been removed while the request was in flight
        let outcome = self.store.write().await.update(&self.job_id, |job| {
            let finished = job.apply(&report);
            (
                finished,
                job.scene_name().to_owned(),
                job.error_message().map(str::to_owned),
            )
        });
        let Some((finished, scene_name, error_message)) = outcome else {
            return Tick::Vanished;
        };
        self.redraw();

        if !report.status.is_terminal() {
            tracing::debug!(
                "Job {} is {} ({}%)",
                self.job_id,
                report.status,
                report.progress
            );
            return Tick::Updated(report.status);
        }

        if finished {
            tracing::info!("Job {} finished with {}", self.job_id, report.status);
            self.notify(&report.status, scene_name, error_message).await;
        }
        Tick::Finished(report.status)
    }

    async fn notify(&self, status: &JobStatus, scene_name: String, error_message: Option<String>) {
        let notification = match status {
            JobStatus::Completed if self.config.notify_on_success => {
                Notification::success(scene_name)
            }
            JobStatus::Failed => Notification::failure(scene_name, error_message),
            _ => return,
        };
        // notifiers may shell out, keep them off the runtime threads
        let sink = Arc::clone(&self.sink);
        if let Err(e) = task::spawn_blocking(move || sink.notify(&notification)).await {
            tracing::warn!("Notification for job {} was lost: {e}", self.job_id);
        }
    }

    fn redraw(&self) {
        let _ = self.events.send(UiEvent::Redraw {
            job_id: self.job_id.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        client::ClientError,
        events::{self, EventReceiver},
        models::{job::RenderJob, payload::JobStatusReport, scene::SceneMetadata},
        notify::NotificationKind,
        store::JobStore,
    };
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };
    use tokio::sync::Notify;

    type Scripted = Result<JobStatusReport, ClientError>;

    /// Replays scripted answers, then keeps repeating the last one.
    struct ScriptedServer {
        answers: Mutex<VecDeque<Scripted>>,
        calls: AtomicUsize,
        // when set, each call waits here until the test releases it
        gate: Option<Arc<Notify>>,
        entered: Arc<Notify>,
    }

    impl ScriptedServer {
        fn new(answers: Vec<Scripted>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                calls: AtomicUsize::new(0),
                gate: None,
                entered: Arc::new(Notify::new()),
            }
        }

        fn gated(answers: Vec<Scripted>, gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new(answers)
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RenderServer for ScriptedServer {
        fn job_status(&self, _job_id: &str) -> Result<JobStatusReport, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            if let Some(gate) = &self.gate {
                tokio::runtime::Handle::current().block_on(gate.notified());
            }
            let mut answers = self.answers.lock().unwrap();
            let answer = if answers.len() > 1 {
                answers.pop_front()
            } else {
                answers.front().map(clone_answer)
            };
            answer.unwrap_or(Err(ClientError::Timeout))
        }
    }

    fn clone_answer(answer: &Scripted) -> Scripted {
        match answer {
            Ok(report) => Ok(report.clone()),
            Err(ClientError::Http { status }) => Err(ClientError::Http { status: *status }),
            Err(_) => Err(ClientError::Timeout),
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<Notification>>,
    }

    impl NotificationSink for RecordingSink {
        fn notify(&self, notification: &Notification) {
            self.seen.lock().unwrap().push(notification.clone());
        }
    }

    fn status(status: JobStatus, progress: u8, error: Option<&str>) -> Scripted {
        Ok(JobStatusReport {
            status,
            progress,
            error_message: error.map(str::to_owned),
        })
    }

    fn fast() -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(5),
            retry_interval: Duration::from_millis(10),
            notify_on_success: true,
        }
    }

    struct Fixture {
        store: SharedJobStore,
        server: Arc<ScriptedServer>,
        sink: Arc<RecordingSink>,
        events: EventReceiver,
        poller: JobPoller,
    }

    fn fixture(server: ScriptedServer, config: PollerConfig) -> Fixture {
        let mut store = JobStore::new();
        store
            .insert(RenderJob::new("abc", &SceneMetadata::new("/work/robot.blend")))
            .unwrap();
        let store = store.shared();
        let server = Arc::new(server);
        let sink = Arc::new(RecordingSink::default());
        let (tx, rx) = events::channel();
        let poller = JobPoller::new(
            "abc",
            Arc::clone(&store),
            Arc::clone(&server) as Arc<dyn RenderServer>,
            Arc::clone(&sink) as Arc<dyn NotificationSink>,
            tx,
            config,
        );
        Fixture {
            store,
            server,
            sink,
            events: rx,
            poller,
        }
    }

    #[tokio::test]
    async fn completed_status_finishes_and_notifies() {
        let mut f = fixture(
            ScriptedServer::new(vec![status(JobStatus::Completed, 100, None)]),
            fast(),
        );

        assert_eq!(f.poller.tick().await, Tick::Finished(JobStatus::Completed));

        let store = f.store.read().await;
        let job = store.get("abc").unwrap();
        assert!(job.is_complete());
        assert!(job.has_notification());
        assert_eq!(job.progress(), 100);

        let seen = f.sink.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, NotificationKind::Success);
        assert_eq!(seen[0].scene_name, "robot.blend");
        assert_eq!(
            f.events.try_recv().unwrap(),
            UiEvent::Redraw {
                job_id: "abc".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn server_error_leaves_record_untouched_and_backs_off() {
        let f = fixture(
            ScriptedServer::new(vec![
                status(JobStatus::Running, 30, None),
                Err(ClientError::Http { status: 500 }),
            ]),
            fast(),
        );

        assert_eq!(f.poller.tick().await, Tick::Updated(JobStatus::Running));
        let tick = f.poller.tick().await;
        assert_eq!(tick, Tick::Failed);
        assert_eq!(tick.next_delay(&fast()), Some(Duration::from_millis(10)));

        let store = f.store.read().await;
        let job = store.get("abc").unwrap();
        assert_eq!(job.status(), &JobStatus::Running);
        assert_eq!(job.progress(), 30);
        assert!(!job.is_complete());
        assert!(f.sink.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_retries_until_terminal() {
        let f = fixture(
            ScriptedServer::new(vec![
                Err(ClientError::Timeout),
                status(JobStatus::Running, 10, None),
                Err(ClientError::Http { status: 502 }),
                status(JobStatus::Running, 60, None),
                status(JobStatus::Failed, 60, Some("GPU out of memory")),
            ]),
            fast(),
        );
        let server = Arc::clone(&f.server);
        let sink = Arc::clone(&f.sink);
        let store = Arc::clone(&f.store);

        tokio::time::timeout(Duration::from_secs(5), f.poller.spawn())
            .await
            .expect("poller should stop on FAILED")
            .unwrap();

        assert_eq!(server.calls(), 5);
        let store = store.read().await;
        let job = store.get("abc").unwrap();
        assert_eq!(job.status(), &JobStatus::Failed);
        assert_eq!(job.error_message(), Some("GPU out of memory"));
        let seen = sink.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, NotificationKind::Failure);
    }

    #[tokio::test]
    async fn removed_record_stops_poller_silently() {
        let f = fixture(
            ScriptedServer::new(vec![status(JobStatus::Running, 5, None)]),
            fast(),
        );
        f.store.write().await.remove("abc");
        assert_eq!(f.poller.tick().await, Tick::Vanished);
        assert_eq!(f.server.calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn removal_during_inflight_request_is_clean() {
        let gate = Arc::new(Notify::new());
        let f = fixture(
            ScriptedServer::gated(
                vec![status(JobStatus::Completed, 100, None)],
                Arc::clone(&gate),
            ),
            fast(),
        );
        let entered = Arc::clone(&f.server.entered);
        let store = Arc::clone(&f.store);
        let sink = Arc::clone(&f.sink);

        let handle = f.poller.spawn();
        entered.notified().await;
        store.write().await.remove("abc");
        gate.notify_one();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("poller should stop once the record is gone")
            .unwrap();
        assert!(store.read().await.is_empty());
        assert!(sink.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn success_notification_can_be_disabled() {
        let config = PollerConfig {
            notify_on_success: false,
            ..fast()
        };
        let f = fixture(
            ScriptedServer::new(vec![status(JobStatus::Completed, 100, None)]),
            config,
        );
        assert_eq!(f.poller.tick().await, Tick::Finished(JobStatus::Completed));
        assert!(f.sink.seen.lock().unwrap().is_empty());
        assert!(f.store.read().await.get("abc").unwrap().has_notification());
    }
}
