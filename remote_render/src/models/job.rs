use super::{payload::JobStatusReport, scene::SceneMetadata, status::JobStatus};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::{hash::Hash, path::PathBuf};

/// Client-side record of a job accepted by the render server.
///
/// Completion is derived from the status, so a record can never claim to be complete
/// while the status says otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderJob {
    job_id: String,
    scene_name: String,
    scene_path: Option<PathBuf>,
    submitted_at: DateTime<Utc>,
    status: JobStatus,
    progress: u8,
    has_notification: bool,
    error_message: Option<String>,
}

impl RenderJob {
    /// Record for a freshly submitted job.
    pub fn new(job_id: impl Into<String>, scene: &SceneMetadata) -> Self {
        Self {
            job_id: job_id.into(),
            scene_name: scene.name(),
            scene_path: scene.path.clone(),
            submitted_at: Utc::now(),
            status: JobStatus::Submitted,
            progress: 0,
            has_notification: false,
            error_message: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.job_id
    }

    pub fn scene_name(&self) -> &str {
        &self.scene_name
    }

    pub fn scene_path(&self) -> Option<&PathBuf> {
        self.scene_path.as_ref()
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Submission time in the user's clock, `HH:MM`.
    pub fn submitted_time(&self) -> String {
        self.submitted_at
            .with_timezone(&Local)
            .format("%H:%M")
            .to_string()
    }

    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    /// Percentage reported by the server. Only meaningful while the job is not complete.
    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn is_complete(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn has_notification(&self) -> bool {
        self.has_notification
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn clear_notification(&mut self) {
        self.has_notification = false;
    }

    /// Write a status report into the record. Returns true when this report made the job terminal.
    pub fn apply(&mut self, report: &JobStatusReport) -> bool {
        let was_complete = self.is_complete();
        self.status = report.status.clone();
        self.progress = report.progress;
        if let Some(message) = report.error_message.as_deref().filter(|m| !m.is_empty()) {
            self.error_message = Some(message.to_owned());
        }

        let finished = self.is_complete() && !was_complete;
        if finished {
            self.has_notification = true;
        }
        finished
    }
}

impl AsRef<str> for RenderJob {
    fn as_ref(&self) -> &str {
        &self.job_id
    }
}

impl PartialEq for RenderJob {
    fn eq(&self, other: &Self) -> bool {
        self.job_id == other.job_id
    }
}

impl Eq for RenderJob {}

impl Hash for RenderJob {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.job_id.hash(state);
    }
}
