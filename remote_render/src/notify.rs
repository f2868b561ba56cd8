//! Completion and failure notifications.
//!
//! The sink is picked once when the session is built: a native desktop notifier when the
//! platform has one, otherwise messages in the host's own report area. Delivery problems
//! are logged and never reach the caller.

use crate::events::{EventSender, ReportLevel, UiEvent};
use std::{env, path::PathBuf, process::Command, sync::Arc};

/// Longest error excerpt shown in a notification.
pub const PREVIEW_LEN: usize = 50;

const APP_NAME: &str = "Remote Render";
const EXPIRE_MS: &str = "10000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub scene_name: String,
    pub error_message: Option<String>,
}

impl Notification {
    pub fn success(scene_name: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            scene_name: scene_name.into(),
            error_message: None,
        }
    }

    pub fn failure(scene_name: impl Into<String>, error_message: Option<String>) -> Self {
        Self {
            kind: NotificationKind::Failure,
            scene_name: scene_name.into(),
            error_message,
        }
    }

    fn error_preview(&self) -> String {
        preview(self.error_message.as_deref().unwrap_or_default())
    }
}

/// First `PREVIEW_LEN` characters of a message.
pub fn preview(message: &str) -> String {
    message.chars().take(PREVIEW_LEN).collect()
}

pub trait NotificationSink: Send + Sync {
    /// Deliver a notification. Must not fail or panic.
    fn notify(&self, notification: &Notification);
}

#[derive(Debug, Clone, PartialEq)]
enum DesktopBackend {
    NotifySend(PathBuf),
    AppleScript(PathBuf),
}

/// Native notifications through the platform's notifier command.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    backend: DesktopBackend,
}

impl DesktopNotifier {
    /// The notifier for this platform, if its command is installed.
    pub fn detect() -> Option<Self> {
        let backend = match env::consts::OS {
            "linux" | "freebsd" | "openbsd" | "netbsd" => {
                DesktopBackend::NotifySend(locate("notify-send")?)
            }
            "macos" => DesktopBackend::AppleScript(locate("osascript")?),
            _ => return None,
        };
        Some(Self { backend })
    }

    fn title(notification: &Notification) -> &'static str {
        match notification.kind {
            NotificationKind::Success => "Render Complete! 🎉",
            NotificationKind::Failure => "Render Failed ❌",
        }
    }

    fn body(notification: &Notification) -> String {
        match notification.kind {
            NotificationKind::Success => {
                format!("Scene '{}' has finished rendering", notification.scene_name)
            }
            NotificationKind::Failure => format!(
                "Scene '{}' failed: {}...",
                notification.scene_name,
                notification.error_preview()
            ),
        }
    }

    fn command(&self, notification: &Notification) -> Command {
        let title = Self::title(notification);
        let body = Self::body(notification);
        match &self.backend {
            DesktopBackend::NotifySend(exe) => {
                let mut cmd = Command::new(exe);
                cmd.args(["--app-name", APP_NAME, "--expire-time", EXPIRE_MS])
                    .arg(title)
                    .arg(body);
                cmd
            }
            DesktopBackend::AppleScript(exe) => {
                let script = format!(
                    "display notification \"{}\" with title \"{}\"",
                    applescript_escape(&body),
                    applescript_escape(title)
                );
                let mut cmd = Command::new(exe);
                cmd.arg("-e").arg(script);
                cmd
            }
        }
    }
}

impl NotificationSink for DesktopNotifier {
    fn notify(&self, notification: &Notification) {
        match self.command(notification).output() {
            Ok(output) if output.status.success() => {
                tracing::debug!("Desktop notification sent for {}", notification.scene_name)
            }
            Ok(output) => tracing::warn!(
                "Desktop notifier exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(e) => tracing::warn!("Unable to run desktop notifier: {e}"),
        }
    }
}

/// Notifications as messages in the host's report area, handed over through the UI event queue.
#[derive(Debug, Clone)]
pub struct HostMessageSink {
    events: EventSender,
}

impl HostMessageSink {
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }
}

impl NotificationSink for HostMessageSink {
    fn notify(&self, notification: &Notification) {
        let (level, message) = match notification.kind {
            NotificationKind::Success => (
                ReportLevel::Info,
                format!("🎉 Render Complete: {}", notification.scene_name),
            ),
            NotificationKind::Failure => (
                ReportLevel::Error,
                format!(
                    "❌ Render Failed: {} - {}",
                    notification.scene_name,
                    notification.error_preview()
                ),
            ),
        };
        if self.events.send(UiEvent::Report { level, message }).is_err() {
            tracing::debug!("Report dropped, nobody is listening for UI events");
        }
    }
}

/// Pick the notification channel once: desktop when available, in-host messages otherwise.
pub fn select_sink(events: EventSender) -> Arc<dyn NotificationSink> {
    match DesktopNotifier::detect() {
        Some(desktop) => {
            tracing::debug!("Using desktop notifications ({:?})", desktop.backend);
            Arc::new(desktop)
        }
        None => Arc::new(HostMessageSink::new(events)),
    }
}

/// Full path of an installed program, if it is on `PATH` and executable.
fn locate(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}

fn applescript_escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
