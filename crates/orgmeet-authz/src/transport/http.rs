//! HTTP decision API

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::{Router, middleware};
use serde::{Deserialize, Serialize};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::auth::{AuthConfig, bearer_auth_middleware};
use crate::audit::ResponseKind;
use crate::authz::{AuthzError, RowFilter};
use crate::config::TransportConfig;
use crate::constants::STATUS_OK;
use crate::service::{AuthzService, Target};
use crate::types::{Collection, OrgId, Operation, Record, RecordId, UserId};
use crate::visibility::ViewerFacts;
use crate::{Error, Result};

/// Check target: a stored record by id, or a record supplied inline
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CheckRequest {
    requester: UserId,
    operation: String,
    #[serde(default)]
    record_id: Option<RecordId>,
    #[serde(default)]
    record: Option<Record>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ListRequest {
    requester: UserId,
    collection: String,
    organization: OrgId,
}

#[derive(Debug, Serialize)]
struct ListResponse {
    filter: RowFilter,
    expression: String,
    records: Vec<Record>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VisibilityRequest {
    requester: UserId,
    organization: OrgId,
    #[serde(default)]
    is_creator: bool,
    #[serde(default)]
    is_recipient: bool,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Request failure rendered with its status class
#[derive(Debug)]
enum ApiError {
    Authz(AuthzError),
    NotFound,
    BadRequest(&'static str),
}

impl From<AuthzError> for ApiError {
    fn from(error: AuthzError) -> Self {
        Self::Authz(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (kind, message) = match self {
            Self::Authz(e) => {
                let kind = ResponseKind::for_error(&e);
                if kind == ResponseKind::BadRequest {
                    (kind, e.to_string())
                } else {
                    tracing::error!(error = %e, "Request failed");
                    (kind, kind.message().to_string())
                }
            }
            Self::NotFound => (ResponseKind::NotFound, ResponseKind::NotFound.message().to_string()),
            Self::BadRequest(msg) => (ResponseKind::BadRequest, msg.to_string()),
        };
        (status(kind.status_code()), Json(ErrorBody { error: message })).into_response()
    }
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Parse operation and target of a check request
fn parse_check(request: CheckRequest) -> std::result::Result<(UserId, Operation, Target), ApiError> {
    let operation: Operation = request.operation.parse()?;
    let target = match (request.record, request.record_id) {
        (Some(record), None) => Target::Inline(record),
        (None, Some(id)) => Target::Stored(id),
        (Some(_), Some(_)) => {
            return Err(ApiError::BadRequest(
                "give either record or record_id, not both",
            ));
        }
        (None, None) => return Err(ApiError::BadRequest("record or record_id is required")),
    };
    Ok((request.requester, operation, target))
}

/// Diagnostic decision with the full denial reason
///
/// Unlike `/v1/enforce` this route distinguishes unknown ids (404) from
/// denied reads (200 with `allow: false`). It is meant for the calling
/// service and operators, never for relaying to end users.
async fn check_handler(
    State(service): State<AuthzService>,
    Json(request): Json<CheckRequest>,
) -> std::result::Result<Response, ApiError> {
    let (requester, operation, target) = parse_check(request)?;
    let record = service
        .resolve(operation, target)?
        .ok_or(ApiError::NotFound)?;
    let decision = service.check(&requester, operation, &record)?;
    Ok(Json(decision).into_response())
}

/// User-facing outcome; unknown ids and denied reads are indistinguishable
async fn enforce_handler(
    State(service): State<AuthzService>,
    Json(request): Json<CheckRequest>,
) -> std::result::Result<Response, ApiError> {
    let (requester, operation, target) = parse_check(request)?;
    let outcome = service.enforce_target(&requester, operation, target);
    Ok((status(outcome.status), Json(outcome)).into_response())
}

async fn list_handler(
    State(service): State<AuthzService>,
    Json(request): Json<ListRequest>,
) -> std::result::Result<Json<ListResponse>, ApiError> {
    let collection: Collection = request.collection.parse()?;
    let listing = service.list(&request.requester, collection, &request.organization)?;
    Ok(Json(ListResponse {
        expression: listing.filter.to_expression(),
        filter: listing.filter,
        records: listing.records,
    }))
}

async fn visibility_handler(
    State(service): State<AuthzService>,
    Json(request): Json<VisibilityRequest>,
) -> std::result::Result<Response, ApiError> {
    let facts = ViewerFacts {
        is_creator: request.is_creator,
        is_recipient: request.is_recipient,
        ..ViewerFacts::default()
    };
    let visibility = service.visibility(&request.requester, &request.organization, &facts)?;
    Ok(Json(visibility).into_response())
}

async fn health_handler(State(service): State<AuthzService>) -> impl IntoResponse {
    let health = service.health();
    let code = if health.status == STATUS_OK {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(health))
}

#[cfg(feature = "metrics")]
async fn metrics_handler() -> impl IntoResponse {
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        crate::observability::render_metrics(),
    )
}

#[cfg(feature = "metrics")]
async fn track_requests(request: axum::extract::Request, next: middleware::Next) -> Response {
    let route = request
        .extensions()
        .get::<axum::extract::MatchedPath>()
        .map_or_else(|| "unmatched".to_owned(), |p| p.as_str().to_owned());
    let response = next.run(request).await;
    crate::observability::record_request(&route, response.status().as_u16());
    response
}

/// Build the application router
///
/// `/health` and `/metrics` stay open for health checks; `/v1/*` sits behind the
/// bearer check when a token is configured.
pub fn router(service: AuthzService, transport: &TransportConfig) -> Router {
    let auth_config = AuthConfig::new(transport.bearer_token.clone());

    let api = Router::new()
        .route("/v1/check", post(check_handler))
        .route("/v1/enforce", post(enforce_handler))
        .route("/v1/list", post(list_handler))
        .route("/v1/visibility", post(visibility_handler))
        .route_layer(middleware::from_fn_with_state(
            auth_config,
            bearer_auth_middleware,
        ));

    #[allow(unused_mut)]
    let mut app = Router::new()
        .route("/health", get(health_handler))
        .merge(api);

    #[cfg(feature = "metrics")]
    {
        app = app
            .route("/metrics", get(metrics_handler))
            .route_layer(middleware::from_fn(track_requests));
    }

    app.with_state(service)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            transport.request_timeout,
        ))
}

/// Serve the decision API until `shutdown` resolves
pub async fn run_http(
    service: AuthzService,
    transport: &TransportConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = SocketAddr::new(transport.http_host, transport.http_port);
    emit_security_warnings(transport.http_host, transport.bearer_token.is_some());

    let app = router(service, transport);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Transport(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("HTTP server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Transport(format!("HTTP server error: {e}")))?;

    tracing::info!("HTTP server shutdown complete");
    Ok(())
}

fn emit_security_warnings(host: IpAddr, auth_enabled: bool) {
    let is_non_loopback = !host.is_loopback();
    let is_all_interfaces = host == IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        || host == IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED);

    if is_all_interfaces {
        tracing::warn!(
            "HTTP server binding to all interfaces (0.0.0.0). \
             This exposes the decision API to all network interfaces."
        );
    } else if is_non_loopback {
        tracing::warn!(
            "HTTP server binding to non-loopback address ({host}). \
             Ensure network security policies are in place."
        );
    }

    if !auth_enabled && is_non_loopback {
        tracing::warn!(
            "SECURITY WARNING: decision API accessible from network without authentication. \
             Set ORGMEET_BEARER_TOKEN to enable authentication."
        );
    }
}
