use crate::cli::{Cli, Commands};
use anyhow::Context;
use remote_render::session::Session;

mod config;
mod display;
mod jobs;

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut session = Session::open().context("Unable to load saved settings and jobs")?;
    if let Some(server) = cli.server.as_deref() {
        session.update_settings(|settings| settings.set_server_url(server))?;
    }

    match cli.command {
        Commands::TestConnection => jobs::test_connection(&mut session),
        Commands::Submit(args) => jobs::submit(&mut session, args).await,
        Commands::Watch => jobs::watch(&mut session).await,
        Commands::List => {
            println!("{}", display::job_list(&session.jobs().await, session.summary().await));
            Ok(())
        }
        Commands::Download {
            job_id,
            scene,
            reveal,
        } => jobs::download(&mut session, &job_id, scene.as_deref(), reveal).await,
        Commands::Remove { job_id } => {
            let job = session.remove(&job_id).await?;
            println!("Removed {} ({})", job.id(), job.scene_name());
            Ok(())
        }
        Commands::ClearCompleted => {
            let removed = session.clear_completed().await?;
            println!("Cleared {removed} finished job(s)");
            Ok(())
        }
        Commands::Config(cmd) => config::run(&mut session, cmd),
    }
}
