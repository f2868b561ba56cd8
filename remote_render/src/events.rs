use std::fmt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLevel {
    Info,
    Error,
}

impl fmt::Display for ReportLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportLevel::Info => f.write_str("INFO"),
            ReportLevel::Error => f.write_str("ERROR"),
        }
    }
}

/// Work that background tasks hand to the interactive side instead of touching UI state
/// themselves.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// A job record changed; the job list should be drawn again.
    Redraw { job_id: String },
    /// A message to show in the host's own report area.
    Report { level: ReportLevel, message: String },
}

pub type EventSender = UnboundedSender<UiEvent>;
pub type EventReceiver = UnboundedReceiver<UiEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
