use crate::models::job::RenderJob;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::sync::RwLock;

pub type SafeLock<T> = Arc<RwLock<T>>;

/// Store shared between the interactive side and the pollers.
pub type SharedJobStore = SafeLock<JobStore>;

pub const JOBS_FILE_NAME: &str = "jobs.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job {0} is already tracked")]
    Duplicate(String),
    #[error("Unable to access job list {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Job list {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Pending, completed and unread counts for the job list header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobSummary {
    pub pending: usize,
    pub completed: usize,
    pub unread: usize,
}

/// Jobs in submission order, looked up by job id.
///
/// Pollers keep only the id and look the record up on every tick, so removing a record
/// is how a poller gets stopped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobStore {
    jobs: Vec<RenderJob>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedJobStore {
        Arc::new(RwLock::new(self))
    }

    pub fn insert(&mut self, job: RenderJob) -> Result<(), StoreError> {
        if self.contains(job.id()) {
            return Err(StoreError::Duplicate(job.id().to_owned()));
        }
        self.jobs.push(job);
        Ok(())
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.position(job_id).is_some()
    }

    pub fn get(&self, job_id: &str) -> Option<&RenderJob> {
        self.jobs.iter().find(|job| job.id() == job_id)
    }

    /// Run `f` against the live record. `None` when the record is gone.
    pub fn update<R>(&mut self, job_id: &str, f: impl FnOnce(&mut RenderJob) -> R) -> Option<R> {
        self.jobs.iter_mut().find(|job| job.id() == job_id).map(f)
    }

    /// Drop a record whatever its state.
    pub fn remove(&mut self, job_id: &str) -> Option<RenderJob> {
        self.position(job_id).map(|index| self.jobs.remove(index))
    }

    /// Drop every completed record. Returns how many went away.
    pub fn remove_all_completed(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|job| !job.is_complete());
        before - self.jobs.len()
    }

    /// Mark the job's results as seen. Returns false for unknown ids.
    pub fn clear_notification(&mut self, job_id: &str) -> bool {
        self.update(job_id, RenderJob::clear_notification).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenderJob> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn summary(&self) -> JobSummary {
        let completed = self.jobs.iter().filter(|job| job.is_complete()).count();
        JobSummary {
            pending: self.jobs.len() - completed,
            completed,
            unread: self.jobs.iter().filter(|job| job.has_notification()).count(),
        }
    }

    fn position(&self, job_id: &str) -> Option<usize> {
        self.jobs.iter().position(|job| job.id() == job_id)
    }

    /// Read a saved job list. A missing file is an empty list.
    pub fn load_from(path: &Path) -> Result<Self, StoreError> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&data).map_err(|source| StoreError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        let data = serde_json::to_string_pretty(self).map_err(|source| StoreError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, data).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
