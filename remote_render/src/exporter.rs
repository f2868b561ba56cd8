use chrono::Utc;
use std::{
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tempfile::{NamedTempFile, TempPath};
use thiserror::Error;

const TEMP_PREFIX: &str = "remote_render";
const TEMP_SUFFIX: &str = ".blend";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Scene file not found: {0}")]
    MissingScene(PathBuf),
    #[error("Unable to create temporary scene file: {0}")]
    TempFile(io::Error),
    #[error("Unable to write scene to {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Something that can turn the current scene into a transferable file.
pub trait SceneExporter {
    fn export(&self) -> Result<ExportedScene, ExportError>;
}

/// Temporary copy of a scene. The file is deleted when this value is dropped,
/// whichever way the upload ends.
#[derive(Debug)]
pub struct ExportedScene {
    path: TempPath,
}

impl ExportedScene {
    // remote_render_<unix seconds>_<random>.blend in the system temp dir
    fn create() -> Result<NamedTempFile, ExportError> {
        tempfile::Builder::new()
            .prefix(&format!("{TEMP_PREFIX}_{}_", Utc::now().timestamp()))
            .suffix(TEMP_SUFFIX)
            .tempfile()
            .map_err(ExportError::TempFile)
    }

    /// Write in-memory scene data to a fresh temporary file.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ExportError> {
        let mut file = Self::create()?;
        file.write_all(data).map_err(|source| ExportError::Write {
            path: file.path().to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name sent to the server with the upload.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{TEMP_PREFIX}{TEMP_SUFFIX}"))
    }
}

/// Exports a scene that is already saved on disk by copying it.
#[derive(Debug, Clone)]
pub struct BlendFileExporter {
    source: PathBuf,
}

impl BlendFileExporter {
    pub fn new(source: impl AsRef<Path>) -> Self {
        Self {
            source: source.as_ref().to_path_buf(),
        }
    }
}

impl SceneExporter for BlendFileExporter {
    fn export(&self) -> Result<ExportedScene, ExportError> {
        let mut source = File::open(&self.source).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ExportError::MissingScene(self.source.clone()),
            _ => ExportError::Write {
                path: self.source.clone(),
                source: e,
            },
        })?;

        let mut target = ExportedScene::create()?;
        io::copy(&mut source, target.as_file_mut()).map_err(|source| ExportError::Write {
            path: target.path().to_path_buf(),
            source,
        })?;

        let path = target.into_temp_path();
        tracing::debug!("Exported {:?} to {:?}", self.source, &*path);
        Ok(ExportedScene { path })
    }
}
