//! Server startup and graceful shutdown

use std::sync::Arc;

use anyhow::Result;
use axum::{extract::Request, middleware::from_fn_with_state, Router, ServiceExt};
use mediaconv_core::Config;
use mediaconv_infra::shutdown_signal;
use tower::Layer;

use crate::auth::{virtual_host_middleware, VirtualHostDomain};

/// Serve `app` until SIGINT or SIGTERM. Virtual-host rewriting wraps the
/// whole router because it must run before routing.
pub async fn start_server(config: &Config, app: Router) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.server_port());
    tracing::info!(addr = %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let domain: VirtualHostDomain = config.gateway_virtual_host_domain().map(Arc::from);
    tracing::info!(
        public_endpoint = %config.gateway_public_endpoint(),
        region = %config.gateway_region(),
        virtual_host_domain = ?domain,
        max_upload_mb = config.max_upload_size_bytes() / 1024 / 1024,
        "Server ready and accepting connections"
    );

    let app = from_fn_with_state(domain, virtual_host_middleware).layer(app);

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
