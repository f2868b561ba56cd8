use clap::{Args, Parser, Subcommand};
use remote_render::models::{engine::Engine, quality::Quality};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "remote-render")]
#[command(version)]
#[command(about = "Submit Blender scenes to a remote render server and keep track of the jobs.")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Render server to talk to. Saved as the new server URL.
    #[arg(long, global = true, env = "REMOTE_RENDER_SERVER")]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that the render server answers its health endpoint
    TestConnection,

    /// Upload a scene and create a render job for it
    Submit(SubmitArgs),

    /// Follow every unfinished job until it completes or fails
    Watch,

    /// Show the tracked jobs
    List,

    /// Fetch the result archive of a job
    Download {
        job_id: String,
        /// Scene the job was rendered from; the archive is saved next to it
        #[arg(long)]
        scene: Option<PathBuf>,
        /// Open the containing folder afterwards
        #[arg(long)]
        reveal: bool,
    },

    /// Stop tracking a job
    Remove { job_id: String },

    /// Stop tracking every completed or failed job
    ClearCompleted,

    /// Inspect or change saved settings
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args)]
pub struct SubmitArgs {
    /// Saved .blend file to render
    pub scene: PathBuf,

    /// CUSTOM, FAST or HIGH. Saved as the new default.
    #[arg(long)]
    pub quality: Option<Quality>,

    #[arg(long)]
    pub start: Option<u32>,

    #[arg(long)]
    pub end: Option<u32>,

    #[arg(long, default_value_t = 1920)]
    pub resolution_x: u32,

    #[arg(long, default_value_t = 1080)]
    pub resolution_y: u32,

    /// CYCLES, EEVEE, EEVEE_NEXT or WORKBENCH
    #[arg(long)]
    pub engine: Option<Engine>,

    /// Cycles sample count for CUSTOM jobs
    #[arg(long)]
    pub samples: Option<u32>,

    /// Return right after submitting instead of following the job
    #[arg(long)]
    pub detach: bool,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the saved settings
    Show,
    /// Change one or more settings
    Set {
        #[arg(long)]
        server_url: Option<String>,
        #[arg(long)]
        start_frame: Option<u32>,
        #[arg(long)]
        end_frame: Option<u32>,
        #[arg(long)]
        quality: Option<Quality>,
        /// Notify when a job completes (failures are always reported)
        #[arg(long)]
        notifications: Option<bool>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_submit_options() {
        let cli = Cli::try_parse_from([
            "remote-render",
            "--server",
            "http://farm:9000",
            "submit",
            "robot.blend",
            "--quality",
            "high",
            "--engine",
            "eevee",
            "--detach",
        ])
        .unwrap();
        assert_eq!(cli.server.as_deref(), Some("http://farm:9000"));
        let Commands::Submit(args) = cli.command else {
            panic!("expected submit");
        };
        assert_eq!(args.scene, PathBuf::from("robot.blend"));
        assert_eq!(args.quality, Some(Quality::High));
        assert_eq!(args.engine, Some(Engine::Eevee));
        assert_eq!(args.resolution_x, 1920);
        assert!(args.detach);
    }

    #[test]
    fn rejects_unknown_quality() {
        let parsed =
            Cli::try_parse_from(["remote-render", "submit", "a.blend", "--quality", "ultra"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn parses_config_set() {
        let cli = Cli::try_parse_from([
            "remote-render",
            "config",
            "set",
            "--end-frame",
            "250",
            "--notifications",
            "false",
        ])
        .unwrap();
        match cli.command {
            Commands::Config(ConfigCommands::Set {
                end_frame,
                notifications,
                start_frame,
                ..
            }) => {
                assert_eq!(end_frame, Some(250));
                assert_eq!(start_frame, None);
                assert_eq!(notifications, Some(false));
            }
            _ => panic!("expected config set"),
        }
    }
}
