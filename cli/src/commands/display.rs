use remote_render::{
    models::{job::RenderJob, status::JobStatus},
    notify::preview,
    settings::Settings,
    store::JobSummary,
};
use std::fmt::Write;

/// The job list the way the panel draws it: header with the unread badge, counts, then one
/// block per job.
pub fn job_list(jobs: &[RenderJob], summary: JobSummary) -> String {
    let mut out = String::from("Render Jobs");
    if summary.unread > 0 {
        let _ = write!(out, "  🔴 {} new", summary.unread);
    }
    out.push('\n');

    if jobs.is_empty() {
        out.push_str("No render jobs yet");
        return out;
    }

    let _ = writeln!(
        out,
        "Pending: {} | Completed: {}",
        summary.pending, summary.completed
    );
    for job in jobs {
        out.push('\n');
        out.push_str(&job_entry(job));
    }
    if summary.completed > 0 {
        out.push_str("\nRun `remote-render clear-completed` to drop finished jobs");
    }
    out
}

fn job_entry(job: &RenderJob) -> String {
    let icon = match job.status() {
        JobStatus::Completed => "✅",
        JobStatus::Failed => "❌",
        _ => "⏳",
    };
    let marker = if job.has_notification() { " 🔴" } else { "" };
    let mut out = format!(
        "{icon} {} ({}){marker}\n   id: {}\n   Status: {}\n",
        job.scene_name(),
        job.submitted_time(),
        job.id(),
        job.status()
    );
    if !job.is_complete() && job.progress() > 0 {
        let _ = writeln!(out, "   Progress: {}", progress_bar(job.progress()));
    }
    if let Some(error) = job.error_message() {
        let _ = writeln!(out, "   Error: {}...", preview(error));
    }
    out
}

/// One line per update while following jobs.
pub fn job_update(job: &RenderJob) -> String {
    if job.is_complete() {
        format!("[{}] {}: {}", job.id(), job.scene_name(), job.status())
    } else {
        format!(
            "[{}] {}: {} {}",
            job.id(),
            job.scene_name(),
            job.status(),
            progress_bar(job.progress())
        )
    }
}

fn progress_bar(progress: u8) -> String {
    const WIDTH: usize = 20;
    let filled = usize::from(progress.min(100)) * WIDTH / 100;
    format!(
        "[{}{}] {progress}%",
        "#".repeat(filled),
        "-".repeat(WIDTH - filled)
    )
}

pub fn settings(settings: &Settings) -> String {
    let (start, end) = settings.frame_range();
    let mut out = format!(
        "Server:        {} ({})\n",
        settings.server_url(),
        settings.server_status()
    );
    if !settings.last_check().is_empty() {
        let _ = writeln!(out, "Last check:    {}", settings.last_check());
    }
    let _ = writeln!(out, "Frames:        {start} - {end}");
    let _ = writeln!(
        out,
        "Quality:       {} ({})",
        settings.quality(),
        settings.quality().summary()
    );
    let _ = write!(
        out,
        "Notifications: {}",
        if settings.show_notifications() { "on" } else { "off" }
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use remote_render::models::{payload::JobStatusReport, scene::SceneMetadata};

    fn job(id: &str, status: JobStatus, progress: u8, error: Option<&str>) -> RenderJob {
        let mut job = RenderJob::new(id, &SceneMetadata::new("/work/robot.blend"));
        job.apply(&JobStatusReport {
            status,
            progress,
            error_message: error.map(str::to_owned),
        });
        job
    }

    #[test]
    fn empty_list() {
        assert_eq!(
            job_list(&[], JobSummary::default()),
            "Render Jobs\nNo render jobs yet"
        );
    }

    #[test]
    fn list_shows_badge_counts_and_progress() {
        let jobs = vec![
            job("a", JobStatus::Running, 40, None),
            job("b", JobStatus::Completed, 100, None),
        ];
        let summary = JobSummary {
            pending: 1,
            completed: 1,
            unread: 1,
        };
        let out = job_list(&jobs, summary);
        assert!(out.starts_with("Render Jobs  🔴 1 new\nPending: 1 | Completed: 1\n"));
        assert!(out.contains("⏳ robot.blend"));
        assert!(out.contains("Progress: [########------------] 40%"));
        assert!(out.contains("✅ robot.blend"));
        assert_eq!(out.matches("Progress").count(), 1);
    }

    #[test]
    fn failed_job_shows_short_error() {
        let long = "e".repeat(80);
        let out = job_entry(&job("c", JobStatus::Failed, 10, Some(&long)));
        assert!(out.starts_with("❌ robot.blend"));
        assert!(out.contains(&format!("Error: {}...", "e".repeat(50))));
        assert!(!out.contains(&"e".repeat(51)));
        assert!(!out.contains("Progress"));
    }

    #[test]
    fn progress_bar_bounds() {
        assert_eq!(progress_bar(0), format!("[{}] 0%", "-".repeat(20)));
        assert_eq!(progress_bar(100), format!("[{}] 100%", "#".repeat(20)));
    }

    #[test]
    fn settings_summary() {
        let out = settings(&Settings::default());
        assert!(out.starts_with("Server:        http://localhost:8080 (Unknown)\n"));
        assert!(out.contains("Frames:        1 - 1"));
        assert!(out.contains("Quality:       FAST"));
        assert!(!out.contains("Last check"));
    }
}
