use super::display;
use crate::cli::ConfigCommands;
use remote_render::session::Session;

pub fn run(session: &mut Session, cmd: ConfigCommands) -> anyhow::Result<()> {
    match cmd {
        ConfigCommands::Show => {}
        ConfigCommands::Set {
            server_url,
            start_frame,
            end_frame,
            quality,
            notifications,
        } => {
            session.update_settings(|settings| {
                if let Some(url) = server_url.as_deref() {
                    settings.set_server_url(url)?;
                }
                if start_frame.is_some() || end_frame.is_some() {
                    let (start, end) = settings.frame_range();
                    settings.set_frame_range(
                        start_frame.unwrap_or(start),
                        end_frame.unwrap_or(end),
                    )?;
                }
                if let Some(quality) = quality {
                    settings.set_quality(quality);
                }
                if let Some(enabled) = notifications {
                    settings.set_show_notifications(enabled);
                }
                Ok(())
            })?;
            println!("Settings saved");
        }
    }
    println!("{}", display::settings(session.settings()));
    Ok(())
}
