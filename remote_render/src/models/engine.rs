use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("Unknown render engine: {0}")]
pub struct EngineParseError(String);

/// Render engine the scene is set up for. Serialized with Blender's own identifiers.
#[derive(Debug, Copy, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Engine {
    #[default]
    #[serde(rename = "CYCLES")]
    Cycles,
    #[serde(rename = "BLENDER_EEVEE")]
    Eevee,
    #[serde(rename = "BLENDER_EEVEE_NEXT")]
    EeveeNext,
    #[serde(rename = "BLENDER_WORKBENCH")]
    Workbench,
}

impl Engine {
    /// Sample count is only forwarded for engines that honour it.
    pub fn uses_samples(&self) -> bool {
        matches!(self, Engine::Cycles)
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Engine::Cycles => "CYCLES",
            Engine::Eevee => "BLENDER_EEVEE",
            Engine::EeveeNext => "BLENDER_EEVEE_NEXT",
            Engine::Workbench => "BLENDER_WORKBENCH",
        };
        f.write_str(name)
    }
}

impl FromStr for Engine {
    type Err = EngineParseError;

    // accepts both the Blender identifier and the short name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CYCLES" => Ok(Engine::Cycles),
            "EEVEE" | "BLENDER_EEVEE" => Ok(Engine::Eevee),
            "EEVEE_NEXT" | "BLENDER_EEVEE_NEXT" => Ok(Engine::EeveeNext),
            "WORKBENCH" | "BLENDER_WORKBENCH" => Ok(Engine::Workbench),
            _ => Err(EngineParseError(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_full_names() {
        assert_eq!("eevee".parse(), Ok(Engine::Eevee));
        assert_eq!("BLENDER_WORKBENCH".parse(), Ok(Engine::Workbench));
        assert!("luxcore".parse::<Engine>().is_err());
    }

    #[test]
    fn only_cycles_uses_samples() {
        assert!(Engine::Cycles.uses_samples());
        assert!(!Engine::EeveeNext.uses_samples());
    }
}
