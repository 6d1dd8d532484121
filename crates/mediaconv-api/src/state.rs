//! Application state and sub-state extractors.
//!
//! Handlers extract only the sub-state they need through `FromRef`.

use std::sync::Arc;

use axum::extract::FromRef;
use mediaconv_db::FileRepository;
use mediaconv_services::{JobDispatcher, PipelineService, ServiceContext};
use mediaconv_storage::Storage;

use crate::auth::GatewayAuthenticator;

/// What the object handlers touch: the store, the file catalog and the
/// services that start jobs for uploads.
#[derive(Clone)]
pub struct ObjectState {
    pub storage: Arc<dyn Storage>,
    pub files: Arc<dyn FileRepository>,
    pub pipelines: PipelineService,
    pub dispatcher: JobDispatcher,
}

#[derive(Clone)]
pub struct AppState {
    pub ctx: ServiceContext,
    pub objects: ObjectState,
    pub authenticator: Arc<GatewayAuthenticator>,
}

impl AppState {
    pub fn new(ctx: ServiceContext) -> Self {
        let objects = ObjectState {
            storage: ctx.storage.clone(),
            files: ctx.repos.files.clone(),
            pipelines: ctx.pipelines(),
            dispatcher: ctx.dispatcher(),
        };
        let authenticator = Arc::new(GatewayAuthenticator::new(ctx.repos.credentials.clone()));
        Self {
            ctx,
            objects,
            authenticator,
        }
    }
}

impl FromRef<AppState> for ObjectState {
    fn from_ref(state: &AppState) -> Self {
        state.objects.clone()
    }
}

impl FromRef<AppState> for Arc<GatewayAuthenticator> {
    fn from_ref(state: &AppState) -> Self {
        state.authenticator.clone()
    }
}
