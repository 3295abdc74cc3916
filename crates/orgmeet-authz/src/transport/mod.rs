//! Transport layer
//!
//! The decision API is served over HTTP when built with the `http` feature.

#[cfg(feature = "http")]
mod auth;
#[cfg(feature = "http")]
mod http;

use std::future::Future;

#[cfg(feature = "http")]
pub use http::router;

use crate::config::Config;
use crate::service::AuthzService;
use crate::Result;

/// Serve the decision API until `shutdown` resolves
#[cfg(feature = "http")]
pub async fn serve(
    service: AuthzService,
    config: &Config,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    http::run_http(service, &config.transport, shutdown).await
}

#[cfg(not(feature = "http"))]
#[allow(clippy::unused_async)]
pub async fn serve(
    _service: AuthzService,
    _config: &Config,
    _shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    Err(crate::Error::Transport(
        "HTTP transport requires the 'http' feature".into(),
    ))
}
