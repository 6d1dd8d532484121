//! Command execution against an explicit [`ServiceContext`].
//!
//! Every command returns a JSON value; printing is left to the binary.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use mediaconv_core::sigv4::{presign_url, PresignParams};
use mediaconv_core::{AppError, PipelineDefinition, PipelineFormat};
use mediaconv_services::{PipelineService, ServiceContext};
use serde_json::{json, Value};

use crate::cli::{BucketCommands, Commands, CredentialCommands, JobCommands, PipelineCommands};

/// `.json` files are JSON, anything else is YAML.
pub fn guess_format(path: &Path) -> PipelineFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => PipelineFormat::Json,
        _ => PipelineFormat::Yaml,
    }
}

async fn read_pipeline_file(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read pipeline file {}", path.display()))
}

/// Parses and compiles a pipeline file without touching the catalog.
pub async fn validate_pipeline(path: &Path, format: Option<PipelineFormat>) -> Result<Value> {
    let format = format.unwrap_or_else(|| guess_format(path));
    let content = read_pipeline_file(path).await?;

    let definition = PipelineDefinition::parse(content.as_bytes(), format)?;
    let params = definition.compile()?;

    Ok(json!({
        "valid": true,
        "name": definition.name,
        "format": format,
        "steps": params.len(),
    }))
}

pub async fn execute(ctx: &ServiceContext, command: Commands) -> Result<Value> {
    match command {
        Commands::Credentials { sub } => credentials(ctx, sub).await,
        Commands::Buckets {
            sub: BucketCommands::Check { name },
        } => Ok(serde_json::to_value(
            ctx.credentials().check_bucket(&name).await?,
        )?),
        Commands::Pipelines { sub } => pipelines(ctx, sub).await,
        Commands::Jobs { sub } => jobs(ctx, sub).await,
        Commands::Presign {
            access_key,
            method,
            bucket,
            key,
            expires,
        } => {
            let credential = ctx
                .credentials()
                .find_active(&access_key)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound("No active credential for access key".to_string())
                })?;
            let url = presign_url(&PresignParams {
                method: method.as_str(),
                endpoint: ctx.config.gateway_public_endpoint(),
                bucket: &bucket,
                key: &key,
                access_key: &credential.access_key,
                secret_key: &credential.secret_key,
                region: Some(ctx.config.gateway_region()),
                expires_in_secs: expires,
                now: Utc::now(),
            })?;
            Ok(json!({ "url": url, "expires_in": expires }))
        }
    }
}

async fn credentials(ctx: &ServiceContext, command: CredentialCommands) -> Result<Value> {
    let service = ctx.credentials();
    match command {
        CredentialCommands::Create { user, bucket } => {
            let issued = service.create(user, bucket.as_deref()).await?;
            Ok(json!({
                "id": issued.credential.id,
                "access_key": issued.credential.access_key,
                "secret_key": issued.secret_key,
                "bucket": issued.credential.bucket_name,
                "endpoint": ctx.config.gateway_public_endpoint(),
                "region": ctx.config.gateway_region(),
                "message": "Store the secret key now; it cannot be shown again",
            }))
        }
        CredentialCommands::List { user } => Ok(serde_json::to_value(service.list(user).await?)?),
        CredentialCommands::Revoke { user, id } => {
            service.revoke(user, id).await?;
            Ok(json!({ "success": true, "message": format!("Credential {} revoked", id) }))
        }
    }
}

async fn pipelines(ctx: &ServiceContext, command: PipelineCommands) -> Result<Value> {
    match command {
        PipelineCommands::Add {
            user,
            name,
            file,
            format,
        } => {
            let format = format.unwrap_or_else(|| guess_format(&file));
            let content = read_pipeline_file(&file).await?;
            let record = ctx
                .pipelines()
                .save(user, name.as_deref(), format, &content)
                .await?;
            Ok(serde_json::to_value(record)?)
        }
        PipelineCommands::Validate { file, format } => validate_pipeline(&file, format).await,
        PipelineCommands::List { user } => {
            let records = ctx.pipelines().list(user).await?;
            let summaries = records
                .iter()
                .map(|record| {
                    let steps = PipelineService::definition(record)
                        .map(|d| d.steps.len())
                        .unwrap_or_default();
                    json!({
                        "id": record.id,
                        "name": record.name,
                        "format": record.format,
                        "steps": steps,
                        "created_at": record.created_at,
                    })
                })
                .collect::<Vec<_>>();
            Ok(Value::Array(summaries))
        }
    }
}

async fn jobs(ctx: &ServiceContext, command: JobCommands) -> Result<Value> {
    let dispatcher = ctx.dispatcher();
    match command {
        JobCommands::Show { id } => {
            let (job, history) = dispatcher.get_with_history(id).await?;
            Ok(json!({ "job": job, "history": history }))
        }
        JobCommands::Cancel { user, id } => {
            let job = dispatcher.cancel(user, id).await?;
            Ok(serde_json::to_value(job)?)
        }
        JobCommands::Rerun { user, id } => {
            let job = dispatcher.rerun(user, id).await?;
            Ok(json!({
                "job": job,
                "message": "Rerun created; it is picked up on the next publish",
            }))
        }
    }
}
