//! Blocking REST client for the render server.
//!
//! Every call carries its own timeout. Failures are classified into connection, timeout,
//! HTTP status, parse and file system errors so callers can turn them into short messages.

use crate::{
    exporter::ExportedScene,
    models::{
        payload::{HealthResponse, JobHandle, JobRequest, JobStatusReport, UploadResult},
        scene::SceneMetadata,
    },
    multipart::FilePart,
    settings::Settings,
};
use serde::de::DeserializeOwned;
use std::{
    fs::{self, File},
    io::{self, Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Could not connect to server: {0}")]
    Connection(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Server returned status {status}")]
    Http { status: u16 },
    #[error("Malformed server response: {0}")]
    Parse(String),
    #[error("Unable to write {path}: {source}")]
    FileSystem { path: PathBuf, source: io::Error },
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Invalid server URL {0:?}")]
    InvalidUrl(String),
}

impl From<ureq::Error> for ClientError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, _) => ClientError::Http { status },
            ureq::Error::Transport(transport) => {
                if is_timeout(&transport) {
                    return ClientError::Timeout;
                }
                match transport.kind() {
                    ureq::ErrorKind::ConnectionFailed | ureq::ErrorKind::Dns => {
                        ClientError::Connection(transport.to_string())
                    }
                    _ => ClientError::Transport(transport.to_string()),
                }
            }
        }
    }
}

impl From<io::Error> for ClientError {
    // io errors reaching here come from reading a response body
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ClientError::Timeout,
            _ => ClientError::Transport(err.to_string()),
        }
    }
}

fn is_timeout(transport: &ureq::Transport) -> bool {
    let mut source = std::error::Error::source(transport);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<io::Error>() {
            if matches!(io.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) {
                return true;
            }
        }
        source = err.source();
    }
    false
}

/// Outcome of a connectivity check. Never an error: each case maps to a status label
/// and a message for the user.
#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    Connected { reported: String },
    HttpError(u16),
    ConnectionFailed,
    Timeout,
    Error(String),
}

impl HealthStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, HealthStatus::Connected { .. })
    }

    /// Short status shown next to the server URL.
    pub fn label(&self) -> String {
        match self {
            HealthStatus::Connected { .. } => "Connected ✓".to_owned(),
            HealthStatus::HttpError(code) => format!("Error {code}"),
            HealthStatus::ConnectionFailed => "Connection Failed".to_owned(),
            HealthStatus::Timeout => "Timeout".to_owned(),
            HealthStatus::Error(_) => "Error".to_owned(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            HealthStatus::Connected { reported } => {
                format!("Server connection successful! Status: {reported}")
            }
            HealthStatus::HttpError(code) => format!("Server returned status: {code}"),
            HealthStatus::ConnectionFailed => {
                "Could not connect to server. Is it running?".to_owned()
            }
            HealthStatus::Timeout => "Connection timeout".to_owned(),
            HealthStatus::Error(e) => format!("Connection failed: {e}"),
        }
    }
}

/// Per-endpoint request timeouts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeouts {
    pub health: Duration,
    pub upload: Duration,
    pub submit: Duration,
    pub status: Duration,
    pub download: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            health: Duration::from_secs(5),
            upload: Duration::from_secs(60),
            submit: Duration::from_secs(30),
            status: Duration::from_secs(10),
            download: Duration::from_secs(60),
        }
    }
}

/// The part of the server a poller needs. Lets the poller run against a fake in tests.
pub trait RenderServer: Send + Sync {
    fn job_status(&self, job_id: &str) -> Result<JobStatusReport, ClientError>;
}

#[derive(Debug, Clone)]
pub struct RenderClient {
    agent: ureq::Agent,
    base: Url,
    timeouts: Timeouts,
}

impl RenderClient {
    pub fn new(server_url: &str) -> Result<Self, ClientError> {
        let base = Url::parse(server_url.trim())
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
            .ok_or_else(|| ClientError::InvalidUrl(server_url.to_owned()))?;
        let agent = ureq::AgentBuilder::new()
            .user_agent(concat!("remote-render/", env!("CARGO_PKG_VERSION")))
            .build();
        Ok(Self {
            agent,
            base,
            timeouts: Timeouts::default(),
        })
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    // path segments are percent-encoded, so job ids cannot escape their slot
    fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.url(path.split('/').filter(|s| !s.is_empty()))
    }

    /// GET /health with a short timeout.
    pub fn check_health(&self) -> HealthStatus {
        let url = match self.endpoint("/health") {
            Ok(url) => url,
            Err(e) => return HealthStatus::Error(e.to_string()),
        };

        let response = match self
            .agent
            .get(url.as_str())
            .timeout(self.timeouts.health)
            .call()
        {
            Ok(response) => response,
            Err(e) => {
                return match ClientError::from(e) {
                    ClientError::Http { status } => HealthStatus::HttpError(status),
                    ClientError::Connection(_) => HealthStatus::ConnectionFailed,
                    ClientError::Timeout => HealthStatus::Timeout,
                    other => HealthStatus::Error(other.to_string()),
                }
            }
        };

        if response.status() != 200 {
            return HealthStatus::HttpError(response.status());
        }
        match read_json::<HealthResponse>(response) {
            Ok(health) => HealthStatus::Connected {
                reported: health.status,
            },
            Err(e) => HealthStatus::Error(e.to_string()),
        }
    }

    /// Upload an exported scene as multipart form data.
    ///
    /// Takes ownership of the scene so the temporary file is removed when this returns,
    /// on success and on every error path.
    pub fn upload(&self, scene: ExportedScene) -> Result<UploadResult, ClientError> {
        let content = fs::read(scene.path()).map_err(|source| ClientError::FileSystem {
            path: scene.path().to_path_buf(),
            source,
        })?;
        let part = FilePart::new("file", &scene.file_name(), &content);
        let url = self.endpoint("/api/files/upload")?;

        tracing::info!("Uploading {} ({} bytes)", scene.file_name(), content.len());
        let response = self
            .agent
            .post(url.as_str())
            .timeout(self.timeouts.upload)
            .set("Content-Type", &part.content_type())
            .send_bytes(part.body())?;

        let response = expect_success(response)?;
        read_json::<UploadResult>(response)
    }

    /// Create a render job for an uploaded scene. The quality setting decides between
    /// the preset endpoint and the custom one.
    pub fn submit(
        &self,
        settings: &Settings,
        upload: &UploadResult,
        scene: &SceneMetadata,
    ) -> Result<JobHandle, ClientError> {
        let request = JobRequest::build(settings, upload, scene);
        let url = self.endpoint(request.endpoint())?;

        tracing::debug!("POST {url} {request:?}");
        let response = self
            .agent
            .post(url.as_str())
            .timeout(self.timeouts.submit)
            .send_json(&request)?;

        let response = expect_success(response)?;
        let value = read_json::<serde_json::Value>(response)?;
        JobHandle::from_response(&value)
            .ok_or_else(|| ClientError::Parse(format!("job id missing in {value}")))
    }

    /// Stream the result archive of a job into `destination`. Returns the byte count.
    /// A partially written file is removed on failure.
    pub fn download(&self, job_id: &str, destination: &Path) -> Result<u64, ClientError> {
        let url = self.url(["api", "files", "download", job_id])?;
        let response = self
            .agent
            .get(url.as_str())
            .timeout(self.timeouts.download)
            .call()?;
        if response.status() != 200 {
            return Err(ClientError::Http {
                status: response.status(),
            });
        }

        let mut file = File::create(destination).map_err(|source| ClientError::FileSystem {
            path: destination.to_path_buf(),
            source,
        })?;
        let result = copy_body(response.into_reader(), &mut file, destination);
        if result.is_err() {
            drop(file);
            let _ = fs::remove_file(destination);
        }
        result
    }
}

impl RenderServer for RenderClient {
    /// GET /api/jobs/{id}. Anything but a 200 with a JSON body is a failure.
    fn job_status(&self, job_id: &str) -> Result<JobStatusReport, ClientError> {
        let url = self.url(["api", "jobs", job_id])?;
        let response = self
            .agent
            .get(url.as_str())
            .timeout(self.timeouts.status)
            .call()?;
        if response.status() != 200 {
            return Err(ClientError::Http {
                status: response.status(),
            });
        }
        let body = response.into_string()?;
        JobStatusReport::parse(&body).map_err(|e| ClientError::Parse(e.to_string()))
    }
}

fn expect_success(response: ureq::Response) -> Result<ureq::Response, ClientError> {
    match response.status() {
        200..=299 => Ok(response),
        status => Err(ClientError::Http { status }),
    }
}

fn read_json<T: DeserializeOwned>(response: ureq::Response) -> Result<T, ClientError> {
    response
        .into_json::<T>()
        .map_err(|e| ClientError::Parse(e.to_string()))
}

fn copy_body(
    mut reader: impl Read,
    writer: &mut impl Write,
    destination: &Path,
) -> Result<u64, ClientError> {
    let mut buf = [0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let read = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        writer
            .write_all(&buf[..read])
            .map_err(|source| ClientError::FileSystem {
                path: destination.to_path_buf(),
                source,
            })?;
        total += read as u64;
    }
    writer.flush().map_err(|source| ClientError::FileSystem {
        path: destination.to_path_buf(),
        source,
    })?;
    Ok(total)
}
