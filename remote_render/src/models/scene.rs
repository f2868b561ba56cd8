use super::engine::Engine;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const UNTITLED_SCENE: &str = "Untitled.blend";

/// Render-relevant facts about the scene being submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMetadata {
    /// Location of the saved scene, if it has been saved at all.
    pub path: Option<PathBuf>,
    pub resolution_x: u32,
    pub resolution_y: u32,
    pub engine: Engine,
    /// Cycles sample count. Ignored for other engines.
    pub samples: Option<u32>,
}

impl Default for SceneMetadata {
    fn default() -> Self {
        Self {
            path: None,
            resolution_x: 1920,
            resolution_y: 1080,
            engine: Engine::default(),
            samples: Some(128),
        }
    }
}

impl SceneMetadata {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            ..Default::default()
        }
    }

    /// Friendly name for the scene: the file name, or `Untitled.blend` when unsaved.
    pub fn name(&self) -> String {
        self.path
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| UNTITLED_SCENE.to_owned())
    }

    /// Samples to send with a custom job; `None` unless the engine uses them.
    pub fn effective_samples(&self) -> Option<u32> {
        if self.engine.uses_samples() {
            self.samples
        } else {
            None
        }
    }
}
