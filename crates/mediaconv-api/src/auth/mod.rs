//! Gateway request authentication
//!
//! Every bucket route is signed with AWS Signature V4, either through the
//! `Authorization` header or a presigned query string. Virtual-hosted
//! requests are rewritten to path style before routing; see
//! [`virtual_host`].

pub mod middleware;
pub mod virtual_host;

pub use middleware::{gateway_auth_middleware, target_bucket, GatewayAuthenticator, GatewayContext};
pub use virtual_host::{virtual_host_middleware, SignedUri, VirtualHostDomain};
