//! Operation mapping
//!
//! Maps one pipeline step onto a concrete tool invocation. Argument vectors
//! are built in a fixed order so the same step always yields the same
//! command line.

use std::fmt::{Display, Formatter, Result as FmtResult};

use mediaconv_core::pipeline::{
    ExtractFrameParams, ResizeParams, ThumbnailParams, ThumbnailType, TranscodeParams,
};
use mediaconv_core::{AppResult, Step, StepParams, ToolPaths};

/// External program a step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Ffmpeg,
    Convert,
    Pdftotext,
}

impl Tool {
    /// Program path to spawn for this tool.
    pub fn program<'a>(&self, paths: &'a ToolPaths) -> &'a str {
        match self {
            Tool::Ffmpeg => &paths.ffmpeg,
            Tool::Convert => &paths.convert,
            Tool::Pdftotext => &paths.pdftotext,
        }
    }
}

impl Display for Tool {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Tool::Ffmpeg => write!(f, "ffmpeg"),
            Tool::Convert => write!(f, "convert"),
            Tool::Pdftotext => write!(f, "pdftotext"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub tool: Tool,
    pub args: Vec<String>,
}

/// Paths substituted into step expressions.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub input_file: String,
    pub output_dir: String,
}

/// Replaces the literal `${input}` with the input file and `${output}` with
/// the output directory. Nothing else is interpreted.
pub fn substitute(expression: &str, ctx: &ExecutionContext) -> String {
    expression
        .replace("${input}", &ctx.input_file)
        .replace("${output}", &ctx.output_dir)
}

fn dimensions(width: &Option<String>, height: &Option<String>) -> Option<(String, String)> {
    match (width, height) {
        (Some(w), Some(h)) => Some((w.clone(), h.clone())),
        _ => None,
    }
}

/// Resolves the step's typed parameters and maps it. Unknown operations and
/// thumbnail types are validation errors.
pub fn map_operation(step: &Step, ctx: &ExecutionContext) -> AppResult<ToolInvocation> {
    let params = step.typed_params()?;
    Ok(map_step(step, &params, ctx))
}

/// Maps a step whose parameters are already resolved.
pub fn map_step(step: &Step, params: &StepParams, ctx: &ExecutionContext) -> ToolInvocation {
    let input = substitute(&step.input, ctx);
    let output = substitute(&step.output, ctx);

    match params {
        StepParams::Transcode(p) => transcode(input, output, p),
        StepParams::Resize(p) => resize(input, output, p),
        StepParams::ExtractText => ToolInvocation {
            tool: Tool::Pdftotext,
            args: vec![input, output],
        },
        StepParams::ExtractFrame(p) => extract_frame(input, output, p),
        StepParams::Convert => ToolInvocation {
            tool: Tool::Convert,
            args: vec![input, output],
        },
        StepParams::GenerateThumbnail(p) => thumbnail(input, output, p),
    }
}

fn transcode(input: String, output: String, p: &TranscodeParams) -> ToolInvocation {
    let mut args = vec!["-i".to_string(), input];
    if let Some(encoder) = p.video_encoder() {
        args.extend(["-c:v".to_string(), encoder.to_string()]);
    }
    if let Some(quality) = p.quality {
        args.extend(["-crf".to_string(), format!("{}", quality.round_ties_even() as i64)]);
    }
    if let Some(audio_codec) = &p.audio_codec {
        args.extend(["-c:a".to_string(), audio_codec.clone()]);
    }
    if let Some(audio_bitrate) = &p.audio_bitrate {
        args.extend(["-b:a".to_string(), audio_bitrate.clone()]);
    }
    args.push(output);
    ToolInvocation {
        tool: Tool::Ffmpeg,
        args,
    }
}

fn resize(input: String, output: String, p: &ResizeParams) -> ToolInvocation {
    let mut args = vec![input];
    if let Some((w, h)) = dimensions(&p.width, &p.height) {
        args.extend(["-resize".to_string(), format!("{}x{}", w, h)]);
    }
    if let Some(quality) = &p.quality {
        args.extend(["-quality".to_string(), quality.clone()]);
    }
    args.push(output);
    ToolInvocation {
        tool: Tool::Convert,
        args,
    }
}

fn extract_frame(input: String, output: String, p: &ExtractFrameParams) -> ToolInvocation {
    let mut args = vec!["-i".to_string(), input];
    if let Some(timestamp) = &p.timestamp {
        args.extend(["-ss".to_string(), timestamp.clone()]);
    }
    args.extend(["-vframes".to_string(), "1".to_string(), output]);
    ToolInvocation {
        tool: Tool::Ffmpeg,
        args,
    }
}

fn thumbnail(input: String, output: String, p: &ThumbnailParams) -> ToolInvocation {
    let size = dimensions(&p.width, &p.height);
    match p.kind {
        ThumbnailType::Video => {
            let timestamp = p
                .timestamp
                .clone()
                .unwrap_or_else(|| ThumbnailParams::DEFAULT_TIMESTAMP.to_string());
            let mut args = vec!["-i".to_string(), input, "-ss".to_string(), timestamp];
            if let Some((w, h)) = size {
                args.extend(["-vf".to_string(), format!("scale={}:{}", w, h)]);
            }
            args.extend(["-vframes".to_string(), "1".to_string(), output]);
            ToolInvocation {
                tool: Tool::Ffmpeg,
                args,
            }
        }
        ThumbnailType::Image | ThumbnailType::Pdf => {
            // [0] selects the first page of a PDF.
            let source = if p.kind == ThumbnailType::Pdf {
                format!("{}[0]", input)
            } else {
                input
            };
            let mut args = vec![source];
            if let Some((w, h)) = size {
                args.extend(["-resize".to_string(), format!("{}x{}", w, h)]);
            }
            args.push(output);
            ToolInvocation {
                tool: Tool::Convert,
                args,
            }
        }
    }
}
