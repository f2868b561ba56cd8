/*
    The session is the one object the front end talks to. It owns the settings and the
    job list, and it is the only writer of the settings. Pollers get the shared store,
    the client and the notification sink when they are started, and talk back only
    through the UI event queue.
*/
use crate::{
    client::{ClientError, HealthStatus, RenderClient, RenderServer, Timeouts},
    download::{archive_file_name, download_directory},
    events::{self, EventReceiver, EventSender, UiEvent},
    exporter::{ExportError, SceneExporter},
    models::{job::RenderJob, scene::SceneMetadata},
    notify::{self, NotificationSink},
    poller::{JobPoller, PollerConfig},
    settings::{config_dir, Settings, SettingsError, SETTINGS_FILE_NAME},
    store::{JobStore, JobSummary, SharedJobStore, StoreError, JOBS_FILE_NAME},
};
use chrono::Local;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tokio::task::{self, JoinHandle};

// how often an idle event wait re-checks whether any poller is left
const IDLE_CHECK: Duration = Duration::from_millis(200);

/// Errors of user actions. The `Display` text is the short message shown to the user.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Error preparing scene: {0}")]
    Export(#[from] ExportError),
    #[error("{}", describe("Upload", .0))]
    Upload(ClientError),
    #[error("{}", describe("Job submission", .0))]
    Submission(ClientError),
    #[error("{}", describe("Download", .0))]
    Download(ClientError),
    #[error("Unknown job: {0}")]
    UnknownJob(String),
    #[error("Server URL rejected: {0}")]
    Client(ClientError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Background task stopped unexpectedly: {0}")]
    Interrupted(String),
}

fn describe(action: &str, err: &ClientError) -> String {
    match err {
        ClientError::Http { status } => format!("{action} failed: {status}"),
        other => format!("{action} error: {other}"),
    }
}

pub struct Session {
    settings: Settings,
    store: SharedJobStore,
    client: RenderClient,
    timeouts: Timeouts,
    sink: Arc<dyn NotificationSink>,
    events_tx: EventSender,
    events_rx: EventReceiver,
    poller_config: PollerConfig,
    pollers: HashMap<String, JoinHandle<()>>,
    // where settings and jobs are saved; in-memory sessions have none
    persist_dir: Option<PathBuf>,
}

impl Session {
    /// In-memory session. The notification sink is chosen for the current platform.
    pub fn new(settings: Settings, store: JobStore) -> Result<Self, SessionError> {
        let client = RenderClient::new(settings.server_url()).map_err(SessionError::Client)?;
        let (events_tx, events_rx) = events::channel();
        let sink = notify::select_sink(events_tx.clone());
        Ok(Self {
            settings,
            store: store.shared(),
            client,
            timeouts: Timeouts::default(),
            sink,
            events_tx,
            events_rx,
            poller_config: PollerConfig::default(),
            pollers: HashMap::new(),
            persist_dir: None,
        })
    }

    /// Session backed by the user's config directory.
    pub fn open() -> Result<Self, SessionError> {
        Self::open_in(config_dir()?)
    }

    pub fn open_in(dir: impl AsRef<Path>) -> Result<Self, SessionError> {
        let dir = dir.as_ref();
        let settings = Settings::load_from(&dir.join(SETTINGS_FILE_NAME))?;
        let store = JobStore::load_from(&dir.join(JOBS_FILE_NAME))?;
        let mut session = Self::new(settings, store)?;
        session.persist_dir = Some(dir.to_path_buf());
        Ok(session)
    }

    /// Replace the notification sink, e.g. to force in-host messages.
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_poller_config(mut self, config: PollerConfig) -> Self {
        self.poller_config = config;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self.client = self.client.with_timeouts(timeouts);
        self
    }

    /// Sender for events raised outside the session, such as an in-host notification sink.
    pub fn event_sender(&self) -> EventSender {
        self.events_tx.clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Change settings. The change is validated as a whole and saved; a new server URL
    /// takes effect for the next request.
    pub fn update_settings(
        &mut self,
        change: impl FnOnce(&mut Settings) -> Result<(), SettingsError>,
    ) -> Result<(), SessionError> {
        let mut updated = self.settings.clone();
        change(&mut updated)?;
        updated.validate()?;
        if updated.server_url() != self.settings.server_url() {
            self.client = RenderClient::new(updated.server_url())
                .map_err(SessionError::Client)?
                .with_timeouts(self.timeouts);
        }
        self.settings = updated;
        self.save_settings()?;
        Ok(())
    }

    pub fn store(&self) -> SharedJobStore {
        Arc::clone(&self.store)
    }

    pub async fn jobs(&self) -> Vec<RenderJob> {
        self.store.read().await.iter().cloned().collect()
    }

    pub async fn summary(&self) -> JobSummary {
        self.store.read().await.summary()
    }

    /// Check the server and remember the result in the settings. Blocks for at most the
    /// health timeout.
    pub fn test_connection(&mut self) -> HealthStatus {
        let health = self.client.check_health();
        tracing::info!("Health check against {}: {}", self.client.base_url(), health.label());
        self.settings.record_health(&health, Local::now());
        if let Err(e) = self.save_settings() {
            tracing::warn!("Unable to save server status: {e}");
        }
        health
    }

    /// Export, upload and create a job, then start following it in the background.
    /// Returns the server's job id. No record is created when any step fails.
    pub async fn submit(
        &mut self,
        exporter: &dyn SceneExporter,
        scene: &SceneMetadata,
    ) -> Result<String, SessionError> {
        let exported = exporter.export()?;
        let client = self.client.clone();
        let settings = self.settings.clone();
        let metadata = scene.clone();

        let handle = task::spawn_blocking(move || {
            let upload = client.upload(exported).map_err(SessionError::Upload)?;
            client
                .submit(&settings, &upload, &metadata)
                .map_err(SessionError::Submission)
        })
        .await
        .map_err(|e| SessionError::Interrupted(e.to_string()))??;

        tracing::info!("Render submitted for {} as job {}", scene.name(), handle.id);
        self.store
            .write()
            .await
            .insert(RenderJob::new(handle.id.clone(), scene))?;
        if let Err(e) = self.save_jobs().await {
            tracing::warn!("Unable to save job list: {e}");
        }
        self.start_poller(&handle.id);
        Ok(handle.id)
    }

    /// Start following a job unless it is already being followed.
    pub fn start_poller(&mut self, job_id: &str) -> bool {
        if self
            .pollers
            .get(job_id)
            .is_some_and(|handle| !handle.is_finished())
        {
            return false;
        }
        let config = PollerConfig {
            notify_on_success: self.settings.show_notifications(),
            ..self.poller_config
        };
        let poller = JobPoller::new(
            job_id,
            Arc::clone(&self.store),
            Arc::new(self.client.clone()) as Arc<dyn RenderServer>,
            Arc::clone(&self.sink),
            self.events_tx.clone(),
            config,
        );
        self.pollers.insert(job_id.to_owned(), poller.spawn());
        true
    }

    /// Follow every job that has not finished yet. Returns how many pollers were started.
    pub async fn resume_polling(&mut self) -> usize {
        let pending = self
            .store
            .read()
            .await
            .iter()
            .filter(|job| !job.is_complete())
            .map(|job| job.id().to_owned())
            .collect::<Vec<_>>();
        pending.iter().filter(|id| self.start_poller(id)).count()
    }

    pub fn active_pollers(&mut self) -> usize {
        self.pollers.retain(|_, handle| !handle.is_finished());
        self.pollers.len()
    }

    /// Next event from the background. `None` once no poller is running and the queue is empty.
    pub async fn next_event(&mut self) -> Option<UiEvent> {
        loop {
            if self.active_pollers() == 0 {
                return self.events_rx.try_recv().ok();
            }
            tokio::select! {
                event = self.events_rx.recv() => return event,
                _ = tokio::time::sleep(IDLE_CHECK) => {}
            }
        }
    }

    /// Everything queued so far, without waiting.
    pub fn drain_events(&mut self) -> Vec<UiEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Drop one job, finished or not. Its poller notices on its next tick.
    pub async fn remove(&mut self, job_id: &str) -> Result<RenderJob, SessionError> {
        let removed = self
            .store
            .write()
            .await
            .remove(job_id)
            .ok_or_else(|| SessionError::UnknownJob(job_id.to_owned()))?;
        self.save_jobs().await?;
        Ok(removed)
    }

    pub async fn clear_completed(&mut self) -> Result<usize, SessionError> {
        let removed = self.store.write().await.remove_all_completed();
        self.save_jobs().await?;
        Ok(removed)
    }

    /// Fetch a job's result archive. The directory comes from `scene_path`, or the scene
    /// the job was submitted from, before falling back to downloads and home.
    pub async fn download(
        &mut self,
        job_id: &str,
        scene_path: Option<&Path>,
    ) -> Result<PathBuf, SessionError> {
        let scene_path = match scene_path {
            Some(path) => Some(path.to_path_buf()),
            None => self
                .store
                .read()
                .await
                .get(job_id)
                .and_then(|job| job.scene_path().cloned()),
        };
        let target = download_directory(scene_path.as_deref()).join(archive_file_name(job_id));

        let client = self.client.clone();
        let id = job_id.to_owned();
        let destination = target.clone();
        let written = task::spawn_blocking(move || client.download(&id, &destination))
            .await
            .map_err(|e| SessionError::Interrupted(e.to_string()))?
            .map_err(SessionError::Download)?;

        tracing::info!("Downloaded {written} bytes to {}", target.display());
        if self.store.write().await.clear_notification(job_id) {
            self.save_jobs().await?;
        }
        Ok(target)
    }

    pub async fn save(&self) -> Result<(), SessionError> {
        self.save_settings()?;
        self.save_jobs().await?;
        Ok(())
    }

    pub fn save_settings(&self) -> Result<(), SettingsError> {
        match &self.persist_dir {
            Some(dir) => self.settings.save_to(&dir.join(SETTINGS_FILE_NAME)),
            None => Ok(()),
        }
    }

    pub async fn save_jobs(&self) -> Result<(), StoreError> {
        match &self.persist_dir {
            Some(dir) => self.store.read().await.save_to(&dir.join(JOBS_FILE_NAME)),
            None => Ok(()),
        }
    }
}
