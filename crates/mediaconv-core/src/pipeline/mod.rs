//! Declarative processing pipelines.
//!
//! A pipeline is a named, ordered list of steps. Each step names an
//! operation, an input expression and an output expression, plus an open
//! parameter map whose accepted keys depend on the operation. The typed view
//! of those parameters lives in [`params`].

pub mod params;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::PipelineFormat;

pub use params::{
    ExtractFrameParams, Operation, ResizeParams, StepParams, ThumbnailParams, ThumbnailType,
    TranscodeParams,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PipelineDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Step {
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<BTreeMap<String, serde_json::Value>>,
}

impl Step {
    pub fn new(operation: &str, input: &str, output: &str) -> Self {
        Self {
            operation: operation.to_string(),
            input: input.to_string(),
            output: output.to_string(),
            params: None,
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.params
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&serde_json::Value> {
        self.params.as_ref().and_then(|p| p.get(key))
    }

    /// Typed parameters for this step's operation.
    pub fn typed_params(&self) -> AppResult<StepParams> {
        StepParams::from_step(self)
    }
}

impl PipelineDefinition {
    pub fn parse(data: &[u8], format: PipelineFormat) -> AppResult<Self> {
        let pipeline = match format {
            PipelineFormat::Yaml => serde_yaml::from_slice(data)?,
            PipelineFormat::Json => serde_json::from_slice(data)?,
        };
        Ok(pipeline)
    }

    pub fn to_string(&self, format: PipelineFormat) -> AppResult<String> {
        match format {
            PipelineFormat::Yaml => serde_yaml::to_string(self).map_err(|e| {
                AppError::Internal(format!("failed to serialize pipeline as YAML: {}", e))
            }),
            PipelineFormat::Json => serde_json::to_string(self).map_err(|e| {
                AppError::Internal(format!("failed to serialize pipeline as JSON: {}", e))
            }),
        }
    }

    /// Inline snapshot representation stored on jobs.
    pub fn to_value(&self) -> AppResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: serde_json::Value) -> AppResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Structural validation: a name, at least one step, and non-empty
    /// operation, input and output on every step.
    pub fn validate(&self) -> AppResult<()> {
        if self.name.is_empty() {
            return Err(AppError::Validation("pipeline name is required".to_string()));
        }
        if self.steps.is_empty() {
            return Err(AppError::Validation(
                "pipeline must have at least one step".to_string(),
            ));
        }
        for (i, step) in self.steps.iter().enumerate() {
            if step.operation.is_empty() {
                return Err(AppError::Validation(format!(
                    "step {}: operation is required",
                    i
                )));
            }
            if step.input.is_empty() {
                return Err(AppError::Validation(format!("step {}: input is required", i)));
            }
            if step.output.is_empty() {
                return Err(AppError::Validation(format!(
                    "step {}: output is required",
                    i
                )));
            }
        }
        Ok(())
    }

    /// Validates the structure and resolves every step's typed parameters,
    /// rejecting unknown operations and mistyped parameters up front.
    pub fn compile(&self) -> AppResult<Vec<StepParams>> {
        self.validate()?;
        self.steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                step.typed_params().map_err(|e| match e {
                    AppError::Validation(msg) => {
                        AppError::Validation(format!("step {}: {}", i, msg))
                    }
                    other => other,
                })
            })
            .collect()
    }
}
