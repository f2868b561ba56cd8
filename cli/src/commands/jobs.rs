use super::display;
use crate::cli::SubmitArgs;
use remote_render::{
    events::{ReportLevel, UiEvent},
    exporter::BlendFileExporter,
    models::{scene::SceneMetadata, status::JobStatus},
    session::Session,
};
use std::{collections::HashMap, fs, path::Path};

pub fn test_connection(session: &mut Session) -> anyhow::Result<()> {
    println!("Checking {}...", session.settings().server_url());
    let health = session.test_connection();
    if !health.is_connected() {
        anyhow::bail!(health.message());
    }
    println!("{}", health.message());
    println!("Last check: {}", session.settings().last_check());
    Ok(())
}

pub async fn submit(session: &mut Session, args: SubmitArgs) -> anyhow::Result<()> {
    if args.quality.is_some() || args.start.is_some() || args.end.is_some() {
        session.update_settings(|settings| {
            if let Some(quality) = args.quality {
                settings.set_quality(quality);
            }
            let (start, end) = settings.frame_range();
            settings.set_frame_range(args.start.unwrap_or(start), args.end.unwrap_or(end))
        })?;
    }

    // absolute, so the download can later land next to the scene
    let scene_path = fs::canonicalize(&args.scene).unwrap_or_else(|_| args.scene.clone());
    let defaults = SceneMetadata::new(&scene_path);
    let scene = SceneMetadata {
        resolution_x: args.resolution_x,
        resolution_y: args.resolution_y,
        engine: args.engine.unwrap_or_default(),
        samples: args.samples.or(defaults.samples),
        ..defaults
    };

    let (start, end) = session.settings().frame_range();
    println!(
        "Submitting {} (frames {start}-{end}, {} quality) to {}...",
        scene.name(),
        session.settings().quality(),
        session.settings().server_url()
    );
    let exporter = BlendFileExporter::new(&scene_path);
    let job_id = session.submit(&exporter, &scene).await?;
    println!("Render submitted successfully! Job ID: {job_id}");

    if args.detach {
        println!("Run `remote-render watch` to follow it later");
        return Ok(());
    }
    follow(session).await
}

pub async fn watch(session: &mut Session) -> anyhow::Result<()> {
    if session.resume_polling().await == 0 {
        println!("No unfinished jobs to follow");
        return Ok(());
    }
    follow(session).await
}

/// Print updates until every poller is done or the user interrupts.
async fn follow(session: &mut Session) -> anyhow::Result<()> {
    println!(
        "Following {} job(s), press Ctrl-C to stop",
        session.active_pollers()
    );
    // only print a job again when something visible changed
    let mut shown: HashMap<String, (JobStatus, u8)> = HashMap::new();

    loop {
        let event = tokio::select! {
            event = session.next_event() => event,
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopped following. Unfinished jobs continue with `remote-render watch`");
                None
            }
        };
        let Some(event) = event else {
            break;
        };

        match event {
            UiEvent::Redraw { job_id } => {
                let store = session.store();
                let store = store.read().await;
                let Some(job) = store.get(&job_id) else {
                    continue;
                };
                let state = (job.status().clone(), job.progress());
                if shown.get(&job_id) != Some(&state) {
                    println!("{}", display::job_update(job));
                    shown.insert(job_id, state);
                }
                drop(store);
                if let Err(e) = session.save_jobs().await {
                    tracing::warn!("Unable to save job list: {e}");
                }
            }
            UiEvent::Report {
                level: ReportLevel::Error,
                message,
            } => eprintln!("{message}"),
            UiEvent::Report { message, .. } => println!("{message}"),
        }
    }

    session.save().await?;
    println!();
    println!(
        "{}",
        display::job_list(&session.jobs().await, session.summary().await)
    );
    Ok(())
}

pub async fn download(
    session: &mut Session,
    job_id: &str,
    scene: Option<&Path>,
    reveal: bool,
) -> anyhow::Result<()> {
    let path = session.download(job_id, scene).await?;
    println!("Results downloaded to: {}", path.display());

    if reveal {
        if let Some(dir) = path.parent() {
            if let Err(e) = open::that(dir) {
                tracing::warn!("Unable to open {}: {e}", dir.display());
            }
        }
    }
    Ok(())
}
