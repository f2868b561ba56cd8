// REST client for the render server: upload, job creation, status, health and download
pub mod client;

// Download directory policy and archive naming
pub mod download;

// Deferred events handed from background tasks to the interactive side
pub mod events;

// Writes the open scene to a temporary file for upload
pub mod exporter;

// Job records, statuses, presets and wire payloads
pub mod models;

// multipart/form-data body encoding for uploads
pub(crate) mod multipart;

// Desktop and in-host notification delivery
pub mod notify;

// Background status polling, one task per job
pub mod poller;

// The interactive context object tying everything together
pub mod session;

// Persisted user settings
pub mod settings;

// Ordered collection of tracked jobs
pub mod store;

#[cfg(test)]
pub(crate) mod test_server;
