use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("Unknown quality preset: {0} (expected CUSTOM, FAST or HIGH)")]
pub struct QualityParseError(String);

/// Quality preset. FAST and HIGH map to fixed sample and bounce counts on the server,
/// CUSTOM forwards the scene's own render settings.
#[derive(Debug, Copy, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Quality {
    Custom,
    #[default]
    Fast,
    High,
}

impl Quality {
    pub fn is_preset(&self) -> bool {
        matches!(self, Quality::Fast | Quality::High)
    }

    /// Short description of what the server does with the preset.
    pub fn summary(&self) -> &'static str {
        match self {
            Quality::Custom => "Use the scene's own render settings",
            Quality::Fast => "64 samples, 4 light bounces. Optimized for speed and previews",
            Quality::High => "1024 samples, 12 light bounces. Maximum quality for final renders",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Quality::Custom => "CUSTOM",
            Quality::Fast => "FAST",
            Quality::High => "HIGH",
        };
        f.write_str(name)
    }
}

impl FromStr for Quality {
    type Err = QualityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CUSTOM" => Ok(Quality::Custom),
            "FAST" => Ok(Quality::Fast),
            "HIGH" => Ok(Quality::High),
            _ => Err(QualityParseError(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_fast_and_high() {
        assert!(Quality::Fast.is_preset());
        assert!(Quality::High.is_preset());
        assert!(!Quality::Custom.is_preset());
    }

    #[test]
    fn serializes_upper_case() {
        assert_eq!(serde_json::to_string(&Quality::High).unwrap(), "\"HIGH\"");
        assert_eq!("fast".parse(), Ok(Quality::Fast));
    }
}
