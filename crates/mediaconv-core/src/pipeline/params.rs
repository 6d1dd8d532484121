//! Typed step parameters.
//!
//! The serialized form keeps parameters as an open map so that definitions
//! round-trip untouched. [`StepParams`] is the closed view the mapper works
//! from: one variant per operation, each field checked for the right kind.
//! Keys an operation does not understand are ignored.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde_json::Value;

use super::Step;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Transcode,
    Resize,
    ExtractText,
    ExtractFrame,
    Convert,
    GenerateThumbnail,
}

impl FromStr for Operation {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transcode" => Ok(Operation::Transcode),
            "resize" => Ok(Operation::Resize),
            "extract_text" => Ok(Operation::ExtractText),
            "extract_frame" => Ok(Operation::ExtractFrame),
            "convert" => Ok(Operation::Convert),
            "generate_thumbnail" => Ok(Operation::GenerateThumbnail),
            _ => Err(AppError::Validation(format!("unsupported operation: {}", s))),
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Operation::Transcode => write!(f, "transcode"),
            Operation::Resize => write!(f, "resize"),
            Operation::ExtractText => write!(f, "extract_text"),
            Operation::ExtractFrame => write!(f, "extract_frame"),
            Operation::Convert => write!(f, "convert"),
            Operation::GenerateThumbnail => write!(f, "generate_thumbnail"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThumbnailType {
    #[default]
    Video,
    Image,
    Pdf,
}

impl FromStr for ThumbnailType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(ThumbnailType::Video),
            "image" => Ok(ThumbnailType::Image),
            "pdf" => Ok(ThumbnailType::Pdf),
            _ => Err(AppError::Validation(format!(
                "unsupported thumbnail type: {}",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranscodeParams {
    pub codec: Option<String>,
    pub quality: Option<f64>,
    pub audio_codec: Option<String>,
    pub audio_bitrate: Option<String>,
}

impl TranscodeParams {
    /// ffmpeg encoder name for the configured codec alias.
    pub fn video_encoder(&self) -> Option<&str> {
        self.codec.as_deref().map(|codec| match codec {
            "h264" => "libx264",
            "h265" => "libx265",
            "vp9" => "libvpx-vp9",
            other => other,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResizeParams {
    pub width: Option<String>,
    pub height: Option<String>,
    pub quality: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractFrameParams {
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThumbnailParams {
    pub kind: ThumbnailType,
    pub timestamp: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
}

impl ThumbnailParams {
    pub const DEFAULT_TIMESTAMP: &'static str = "00:00:01";
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepParams {
    Transcode(TranscodeParams),
    Resize(ResizeParams),
    ExtractText,
    ExtractFrame(ExtractFrameParams),
    Convert,
    GenerateThumbnail(ThumbnailParams),
}

impl StepParams {
    pub fn from_step(step: &Step) -> AppResult<Self> {
        let operation: Operation = step.operation.parse()?;
        let p = ParamReader { step, operation };

        Ok(match operation {
            Operation::Transcode => StepParams::Transcode(TranscodeParams {
                codec: p.string("codec")?,
                quality: p.number("quality")?,
                audio_codec: p.string("audio_codec")?,
                audio_bitrate: p.string("audio_bitrate")?,
            }),
            Operation::Resize => StepParams::Resize(ResizeParams {
                width: p.scalar("width")?,
                height: p.scalar("height")?,
                quality: p.scalar("quality")?,
            }),
            Operation::ExtractText => StepParams::ExtractText,
            Operation::ExtractFrame => StepParams::ExtractFrame(ExtractFrameParams {
                timestamp: p.string("timestamp")?,
            }),
            Operation::Convert => StepParams::Convert,
            Operation::GenerateThumbnail => StepParams::GenerateThumbnail(ThumbnailParams {
                kind: p
                    .string("type")?
                    .map(|t| t.parse::<ThumbnailType>())
                    .transpose()?
                    .unwrap_or_default(),
                timestamp: p.string("timestamp")?,
                width: p.scalar("width")?,
                height: p.scalar("height")?,
            }),
        })
    }

    pub fn operation(&self) -> Operation {
        match self {
            StepParams::Transcode(_) => Operation::Transcode,
            StepParams::Resize(_) => Operation::Resize,
            StepParams::ExtractText => Operation::ExtractText,
            StepParams::ExtractFrame(_) => Operation::ExtractFrame,
            StepParams::Convert => Operation::Convert,
            StepParams::GenerateThumbnail(_) => Operation::GenerateThumbnail,
        }
    }
}

struct ParamReader<'a> {
    step: &'a Step,
    operation: Operation,
}

impl ParamReader<'_> {
    fn get(&self, key: &str) -> Option<&Value> {
        self.step.param(key).filter(|v| !v.is_null())
    }

    fn wrong_kind(&self, key: &str, expected: &str) -> AppError {
        AppError::Validation(format!(
            "{}: parameter '{}' must be a {}",
            self.operation, key, expected
        ))
    }

    fn string(&self, key: &str) -> AppResult<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.wrong_kind(key, "string")),
        }
    }

    fn number(&self, key: &str) -> AppResult<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.wrong_kind(key, "number")),
            Some(_) => Err(self.wrong_kind(key, "number")),
        }
    }

    /// A number or string, rendered the way it will appear on a command line.
    fn scalar(&self, key: &str) -> AppResult<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(format_number(n))),
            Some(_) => Err(self.wrong_kind(key, "number or string")),
        }
    }
}

fn format_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    // f64 Display drops a zero fraction, so 320.0 renders as "320".
    n.as_f64().map(|f| f.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcode_params() {
        let step = Step::new("transcode", "in", "out")
            .with_param("codec", "h265")
            .with_param("quality", 28)
            .with_param("audio_codec", "aac")
            .with_param("unrelated", true);
        match step.typed_params().unwrap() {
            StepParams::Transcode(p) => {
                assert_eq!(p.video_encoder(), Some("libx265"));
                assert_eq!(p.quality, Some(28.0));
                assert_eq!(p.audio_codec.as_deref(), Some("aac"));
                assert_eq!(p.audio_bitrate, None);
            }
            other => panic!("unexpected params: {:?}", other),
        }
    }

    #[test]
    fn test_codec_alias_passthrough() {
        let p = TranscodeParams {
            codec: Some("prores".to_string()),
            ..Default::default()
        };
        assert_eq!(p.video_encoder(), Some("prores"));
    }

    #[test]
    fn test_wrong_kind_is_validation_error() {
        let step = Step::new("transcode", "in", "out").with_param("quality", "high");
        let err = step.typed_params().unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.to_string().contains("quality"));
    }

    #[test]
    fn test_scalar_accepts_number_or_string() {
        let step = Step::new("resize", "in", "out")
            .with_param("width", 640.0)
            .with_param("height", "480")
            .with_param("quality", 85);
        match step.typed_params().unwrap() {
            StepParams::Resize(p) => {
                assert_eq!(p.width.as_deref(), Some("640"));
                assert_eq!(p.height.as_deref(), Some("480"));
                assert_eq!(p.quality.as_deref(), Some("85"));
            }
            other => panic!("unexpected params: {:?}", other),
        }
    }

    #[test]
    fn test_thumbnail_type_default_and_unknown() {
        let step = Step::new("generate_thumbnail", "in", "out");
        match step.typed_params().unwrap() {
            StepParams::GenerateThumbnail(p) => assert_eq!(p.kind, ThumbnailType::Video),
            other => panic!("unexpected params: {:?}", other),
        }

        let step = Step::new("generate_thumbnail", "in", "out").with_param("type", "audio");
        assert!(matches!(
            step.typed_params(),
            Err(AppError::Validation(msg)) if msg.contains("thumbnail type")
        ));
    }

    #[test]
    fn test_unknown_operation() {
        let step = Step::new("blur", "in", "out");
        assert!(matches!(
            step.typed_params(),
            Err(AppError::Validation(msg)) if msg == "unsupported operation: blur"
        ));
    }
}
