//! Route configuration.

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, put},
    Router,
};
use mediaconv_core::Config;
use mediaconv_infra::request_id_middleware;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::auth::gateway_auth_middleware;
use crate::handlers::{health::health, objects};
use crate::state::AppState;

/// `/health` is public; every bucket route goes through SigV4 auth.
pub fn setup_routes(config: &Config, state: AppState) -> Router {
    let object_routes = Router::new()
        .route("/{bucket}", get(objects::list_objects))
        .route(
            "/{bucket}/{*key}",
            put(objects::put_object)
                .post(objects::put_object)
                .get(objects::get_object)
                .head(objects::head_object)
                .delete(objects::delete_object),
        )
        .route_layer(from_fn_with_state(
            state.authenticator.clone(),
            gateway_auth_middleware,
        ))
        .layer(RequestBodyLimitLayer::new(config.max_upload_size_bytes()));

    Router::new()
        .route("/health", get(health))
        .merge(object_routes)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
