//! JSON bodies exchanged with the render server.
//!
//! Field names follow the server's camelCase contract. Responses are parsed leniently:
//! anything the client can do without is optional.

use super::{engine::Engine, quality::Quality, scene::SceneMetadata, status::JobStatus};
use crate::settings::Settings;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const OUTPUT_FORMAT: &str = "PNG";
pub const DEVICE_TYPE: &str = "AUTO";
const UNKNOWN_FILE_NAME: &str = "unknown.blend";
const UNKNOWN_STATUS: &str = "UNKNOWN";

pub const PRESET_ENDPOINT: &str = "/api/presets/render";
pub const JOBS_ENDPOINT: &str = "/api/jobs";

/// Server's answer to a file upload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    #[serde(default = "unknown_file_name")]
    pub file_name: String,
}

fn unknown_file_name() -> String {
    UNKNOWN_FILE_NAME.to_owned()
}

/// Job creation body for the FAST and HIGH presets.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetJobRequest {
    pub file_name: String,
    pub quality: Quality,
    pub start_frame: u32,
    pub end_frame: u32,
    pub resolution_x: u32,
    pub resolution_y: u32,
    pub output_format: &'static str,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSettings {
    pub start_frame: u32,
    pub end_frame: u32,
    pub resolution_x: u32,
    pub resolution_y: u32,
    pub samples: Option<u32>,
    pub output_format: &'static str,
    pub render_engine: Engine,
    pub device_type: &'static str,
}

/// Job creation body when the scene's own settings are used.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomJobRequest {
    pub file_name: String,
    pub render_settings: RenderSettings,
    pub description: String,
}

/// A job creation request together with the endpoint it must be posted to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JobRequest {
    Preset(PresetJobRequest),
    Custom(CustomJobRequest),
}

impl JobRequest {
    /// Pick the payload shape from the quality setting. Presets go to the preset endpoint,
    /// CUSTOM carries the full render settings.
    pub fn build(settings: &Settings, upload: &UploadResult, scene: &SceneMetadata) -> Self {
        let scene_name = scene.name();
        let quality = settings.quality();
        let (start_frame, end_frame) = settings.frame_range();

        if quality.is_preset() {
            JobRequest::Preset(PresetJobRequest {
                file_name: upload.file_name.clone(),
                quality,
                start_frame,
                end_frame,
                resolution_x: scene.resolution_x,
                resolution_y: scene.resolution_y,
                output_format: OUTPUT_FORMAT,
                description: format!(
                    "Blender render job from {scene_name} ({quality} quality)"
                ),
            })
        } else {
            JobRequest::Custom(CustomJobRequest {
                file_name: upload.file_name.clone(),
                render_settings: RenderSettings {
                    start_frame,
                    end_frame,
                    resolution_x: scene.resolution_x,
                    resolution_y: scene.resolution_y,
                    samples: scene.effective_samples(),
                    output_format: OUTPUT_FORMAT,
                    render_engine: scene.engine,
                    device_type: DEVICE_TYPE,
                },
                description: format!("Blender render job from {scene_name}"),
            })
        }
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            JobRequest::Preset(_) => PRESET_ENDPOINT,
            JobRequest::Custom(_) => JOBS_ENDPOINT,
        }
    }
}

/// Identifier handed back by the server for a created job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobHandle {
    pub id: String,
}

impl JobHandle {
    /// Read the `id` field, which some servers send as a number.
    pub fn from_response(body: &Value) -> Option<Self> {
        let id = match body.get("id")? {
            Value::String(id) if !id.is_empty() => id.clone(),
            Value::Number(id) => id.to_string(),
            _ => return None,
        };
        Some(Self { id })
    }
}

/// One answer of the status endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatusReport {
    pub status: JobStatus,
    pub progress: u8,
    pub error_message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatusWire {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    progress: Option<Value>,
    #[serde(default)]
    error_message: Option<Value>,
}

impl JobStatusReport {
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        let wire: JobStatusWire = serde_json::from_str(body)?;
        Ok(Self {
            status: JobStatus::from(wire.status.as_deref().unwrap_or(UNKNOWN_STATUS)),
            progress: wire.progress.as_ref().map(parse_progress).unwrap_or(0),
            error_message: wire.error_message.and_then(parse_error_message),
        })
    }
}

fn parse_progress(value: &Value) -> u8 {
    let raw = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    raw.clamp(0.0, 100.0) as u8
}

// servers send plain strings, but structured errors are kept as their JSON text
fn parse_error_message(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Body of `/health`.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    #[serde(default = "unknown_health")]
    pub status: String,
}

fn unknown_health() -> String {
    "unknown".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scene() -> SceneMetadata {
        SceneMetadata {
            path: Some("/work/robot.blend".into()),
            resolution_x: 1920,
            resolution_y: 1080,
            engine: Engine::Cycles,
            samples: Some(256),
        }
    }

    fn upload() -> UploadResult {
        UploadResult {
            file_name: "remote_render_1.blend".to_owned(),
        }
    }

    fn settings(quality: Quality) -> Settings {
        let mut settings = Settings::default();
        settings.set_quality(quality);
        settings.set_frame_range(1, 10).unwrap();
        settings
    }

    #[test]
    fn fast_quality_builds_preset_payload() {
        let request = JobRequest::build(&settings(Quality::Fast), &upload(), &scene());
        assert_eq!(request.endpoint(), PRESET_ENDPOINT);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "fileName": "remote_render_1.blend",
                "quality": "FAST",
                "startFrame": 1,
                "endFrame": 10,
                "resolutionX": 1920,
                "resolutionY": 1080,
                "outputFormat": "PNG",
                "description": "Blender render job from robot.blend (FAST quality)",
            })
        );
    }

    #[test]
    fn endpoint_depends_only_on_quality() {
        let mut eevee = scene();
        eevee.engine = Engine::Eevee;
        eevee.path = None;
        for scene in [scene(), eevee] {
            for quality in [Quality::Fast, Quality::High, Quality::Custom] {
                let request = JobRequest::build(&settings(quality), &upload(), &scene);
                let expected = if quality.is_preset() {
                    PRESET_ENDPOINT
                } else {
                    JOBS_ENDPOINT
                };
                assert_eq!(request.endpoint(), expected);
                assert_eq!(
                    matches!(request, JobRequest::Preset(_)),
                    quality.is_preset()
                );
            }
        }
    }

    #[test]
    fn custom_payload_nests_render_settings() {
        let request = JobRequest::build(&settings(Quality::Custom), &upload(), &scene());
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["renderSettings"]["samples"], 256);
        assert_eq!(value["renderSettings"]["renderEngine"], "CYCLES");
        assert_eq!(value["renderSettings"]["deviceType"], "AUTO");
        assert_eq!(value["description"], "Blender render job from robot.blend");
        assert!(value.get("quality").is_none());
    }

    #[test]
    fn custom_payload_sends_null_samples_for_eevee() {
        let mut scene = scene();
        scene.engine = Engine::Eevee;
        let request = JobRequest::build(&settings(Quality::Custom), &upload(), &scene);
        let value = serde_json::to_value(&request).unwrap();
        assert!(value["renderSettings"]["samples"].is_null());
        assert_eq!(value["renderSettings"]["renderEngine"], "BLENDER_EEVEE");
    }

    #[test]
    fn job_handle_accepts_string_or_number_id() {
        assert_eq!(
            JobHandle::from_response(&json!({"id": "abc"})).unwrap().id,
            "abc"
        );
        assert_eq!(JobHandle::from_response(&json!({"id": 17})).unwrap().id, "17");
        assert!(JobHandle::from_response(&json!({"jobId": 17})).is_none());
    }

    #[test]
    fn status_report_is_lenient() {
        let report = JobStatusReport::parse(r#"{"progress": 150.5}"#).unwrap();
        assert_eq!(report.status, JobStatus::Other("UNKNOWN".to_owned()));
        assert_eq!(report.progress, 100);
        assert_eq!(report.error_message, None);

        let report =
            JobStatusReport::parse(r#"{"status":"FAILED","progress":"12","errorMessage":null}"#)
                .unwrap();
        assert_eq!(report.status, JobStatus::Failed);
        assert_eq!(report.progress, 12);

        assert!(JobStatusReport::parse("<html>").is_err());
    }

    #[test]
    fn structured_error_message_still_parses() {
        let report = JobStatusReport::parse(
            r#"{"status":"FAILED","progress":100,"errorMessage":{"detail":"GPU OOM"}}"#,
        )
        .unwrap();
        assert_eq!(report.status, JobStatus::Failed);
        assert_eq!(
            report.error_message.as_deref(),
            Some(r#"{"detail":"GPU OOM"}"#)
        );

        let report =
            JobStatusReport::parse(r#"{"status":"FAILED","errorMessage":42}"#).unwrap();
        assert_eq!(report.error_message.as_deref(), Some("42"));

        let report =
            JobStatusReport::parse(r#"{"status":"FAILED","errorMessage":""}"#).unwrap();
        assert_eq!(report.error_message, None);

        let report =
            JobStatusReport::parse(r#"{"status":"FAILED","errorMessage":"out of memory"}"#)
                .unwrap();
        assert_eq!(report.error_message.as_deref(), Some("out of memory"));
    }

    #[test]
    fn upload_result_defaults_file_name() {
        let result: UploadResult = serde_json::from_str("{}").unwrap();
        assert_eq!(result.file_name, UNKNOWN_FILE_NAME);
    }
}
