use regex::Regex;
use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

/// Where results go: next to the scene when it is known, else the user's downloads
/// folder, else the home directory. Falls back to the working directory on systems with
/// neither.
pub fn download_directory(scene_path: Option<&Path>) -> PathBuf {
    resolve_directory(scene_path, dirs::download_dir(), dirs::home_dir())
}

fn resolve_directory(
    scene_path: Option<&Path>,
    downloads: Option<PathBuf>,
    home: Option<PathBuf>,
) -> PathBuf {
    if let Some(dir) = scene_path
        .and_then(Path::parent)
        .filter(|dir| !dir.as_os_str().is_empty() && dir.is_dir())
    {
        return dir.to_path_buf();
    }
    if let Some(downloads) = downloads.filter(|dir| dir.is_dir()) {
        return downloads;
    }
    home.unwrap_or_else(|| PathBuf::from("."))
}

/// `render_job_<id>.zip`, with characters that are not allowed in file names replaced.
pub fn archive_file_name(job_id: &str) -> String {
    static INVALID: OnceLock<Regex> = OnceLock::new();
    let re = INVALID.get_or_init(|| {
        Regex::new(r#"[/\\?%*:|"<>\x00-\x1f]"#).expect("file name pattern is valid")
    });
    let id = re.replace_all(job_id, "-");
    // keep "." and ".." from turning into directory references
    let id = if id.trim_matches('.').is_empty() {
        id.replace('.', "-")
    } else {
        id.into_owned()
    };
    format!("render_job_{id}.zip")
}
