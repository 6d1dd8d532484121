//! Object operations under the caller's key namespace.
//!
//! Client keys map to `users/{user_id}/{key}` in the shared store, so a
//! credential can only ever reach its own user's objects.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Extension,
};
use mediaconv_core::models::{Actor, File, NewFile};
use mediaconv_core::AppError;
use mediaconv_services::PipelineSource;
use mediaconv_storage::{keys, ObjectInfo};
use futures::TryStreamExt;
use serde::Deserialize;
use tokio_util::io::StreamReader;

use crate::auth::GatewayContext;
use crate::error::HttpAppError;
use crate::state::ObjectState;
use crate::xml::{self, ListEntry};

/// Metadata header naming a saved pipeline to run on the upload.
pub const PIPELINE_HEADER: &str = "x-amz-meta-pipeline";
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
pub const JOB_CREATED_FROM_UPLOAD: &str = "Job created from upload";

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug, Deserialize)]
pub struct ListObjectsQuery {
    pub prefix: Option<String>,
}

fn header_value(value: &str) -> Result<HeaderValue, HttpAppError> {
    HeaderValue::from_str(value)
        .map_err(|e| HttpAppError(AppError::Internal(format!("invalid header value: {}", e))))
}

fn quoted(etag: &str) -> String {
    format!("\"{}\"", etag)
}

fn object_headers(info: &ObjectInfo) -> Result<HeaderMap, HttpAppError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        header_value(info.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE))?,
    );
    headers.insert(CONTENT_LENGTH, HeaderValue::from(info.size));
    if let Some(etag) = &info.e_tag {
        headers.insert(ETAG, header_value(&quoted(etag))?);
    }
    headers.insert(
        LAST_MODIFIED,
        header_value(&info.last_modified.format(HTTP_DATE_FORMAT).to_string())?,
    );
    Ok(headers)
}

/// `PUT` and `POST /{bucket}/{key}`.
///
/// The body is streamed to the store. Cataloguing the file and starting a
/// pipeline are best effort: the upload succeeds even when they fail.
#[tracing::instrument(
    skip(state, headers, body),
    fields(user_id = gateway.user_id, key = %key)
)]
pub async fn put_object(
    State(state): State<ObjectState>,
    Extension(gateway): Extension<GatewayContext>,
    Path((_bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, HttpAppError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();
    let storage_key = keys::user_object_key(gateway.user_id, &key);

    let reader = StreamReader::new(body.into_data_stream().map_err(std::io::Error::other));
    let info = state
        .storage
        .put_stream(&storage_key, Box::pin(reader), &content_type)
        .await?;
    tracing::info!(storage_key = %storage_key, size = info.size, "Object stored");

    let file = state
        .files
        .upsert(NewFile {
            user_id: gateway.user_id,
            original_name: original_name(&key).to_string(),
            storage_key: storage_key.clone(),
            size: info.size as i64,
            content_type,
        })
        .await;

    match file {
        Ok(file) => {
            let pipeline = headers
                .get(PIPELINE_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(name) = pipeline {
                start_pipeline(&state, &file, name).await;
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, storage_key = %storage_key, "Failed to record uploaded file");
        }
    }

    put_response(&info)
}

/// `200` with the stored object's ETag; no ETag when the store reports none.
fn put_response(info: &ObjectInfo) -> Result<Response, HttpAppError> {
    let mut response = StatusCode::OK.into_response();
    if let Some(etag) = &info.e_tag {
        response
            .headers_mut()
            .insert(ETAG, header_value(&quoted(etag))?);
    }
    Ok(response)
}

/// Last path segment of the client key.
fn original_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

async fn start_pipeline(state: &ObjectState, file: &File, name: &str) {
    let pipeline = match state.pipelines.find_by_name(file.user_id, name).await {
        Ok(Some(pipeline)) => pipeline,
        Ok(None) => {
            tracing::warn!(
                pipeline = %name,
                user_id = file.user_id,
                "Pipeline not found, skipping job creation"
            );
            return;
        }
        Err(e) => {
            tracing::error!(error = %e, pipeline = %name, "Failed to look up pipeline");
            return;
        }
    };

    match state
        .dispatcher
        .create_job(
            file.id,
            PipelineSource::Saved(pipeline.id),
            Actor::User,
            JOB_CREATED_FROM_UPLOAD,
        )
        .await
    {
        Ok(job) => tracing::info!(
            job_id = job.id,
            file_id = file.id,
            pipeline_id = pipeline.id,
            "Job started for upload"
        ),
        Err(e) => tracing::error!(error = %e, file_id = file.id, "Failed to create job"),
    }
}

#[tracing::instrument(skip(state), fields(user_id = gateway.user_id))]
pub async fn get_object(
    State(state): State<ObjectState>,
    Extension(gateway): Extension<GatewayContext>,
    Path((_bucket, key)): Path<(String, String)>,
) -> Result<Response, HttpAppError> {
    let storage_key = keys::user_object_key(gateway.user_id, &key);
    let (info, stream) = state.storage.get(&storage_key).await?;

    let headers = object_headers(&info)?;
    Ok((StatusCode::OK, headers, Body::from_stream(stream)).into_response())
}

#[tracing::instrument(skip(state), fields(user_id = gateway.user_id))]
pub async fn head_object(
    State(state): State<ObjectState>,
    Extension(gateway): Extension<GatewayContext>,
    Path((_bucket, key)): Path<(String, String)>,
) -> Result<Response, HttpAppError> {
    let storage_key = keys::user_object_key(gateway.user_id, &key);
    let info = state.storage.head(&storage_key).await?;

    let headers = object_headers(&info)?;
    Ok((StatusCode::OK, headers).into_response())
}

#[tracing::instrument(skip(state), fields(user_id = gateway.user_id))]
pub async fn delete_object(
    State(state): State<ObjectState>,
    Extension(gateway): Extension<GatewayContext>,
    Path((_bucket, key)): Path<(String, String)>,
) -> Result<StatusCode, HttpAppError> {
    let storage_key = keys::user_object_key(gateway.user_id, &key);
    state.storage.delete(&storage_key).await?;

    match state.files.delete_by_key(gateway.user_id, &storage_key).await {
        Ok(true) => {}
        Ok(false) => tracing::debug!(storage_key = %storage_key, "No catalog row for deleted object"),
        Err(e) => {
            tracing::warn!(error = %e, storage_key = %storage_key, "Failed to remove catalog row")
        }
    }

    tracing::info!(storage_key = %storage_key, "Object deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /{bucket}`: keys are returned relative to the user namespace, in
/// store order.
#[tracing::instrument(skip(state), fields(user_id = gateway.user_id))]
pub async fn list_objects(
    State(state): State<ObjectState>,
    Extension(gateway): Extension<GatewayContext>,
    Path(bucket): Path<String>,
    Query(query): Query<ListObjectsQuery>,
) -> Result<Response, HttpAppError> {
    let prefix = query.prefix.unwrap_or_default();
    let search = keys::user_object_key(gateway.user_id, &prefix);
    let objects = state.storage.list(&search).await?;

    let entries: Vec<ListEntry> = objects
        .into_iter()
        .filter_map(|info| {
            let key = keys::strip_user_prefix(gateway.user_id, &info.key)?.to_string();
            Some(ListEntry {
                key,
                last_modified: info.last_modified,
                etag: info.e_tag.unwrap_or_default(),
                size: info.size,
            })
        })
        .collect();

    let body = xml::list_bucket_result(&bucket, &prefix, &entries);
    Ok((
        StatusCode::OK,
        [(CONTENT_TYPE, HeaderValue::from_static("application/xml"))],
        body,
    )
        .into_response())
}
