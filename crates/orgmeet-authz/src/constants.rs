//! Constants for the authorization service

/// Longest owner chain followed before a record is treated as unresolvable.
/// Real chains are at most three hops (vote -> motion -> meeting -> org).
pub const MAX_CHAIN_DEPTH: usize = 16;

/// Default service name for logs
pub const DEFAULT_SERVICE_NAME: &str = "orgmeet-authz";

/// Default log filter
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default HTTP port for `serve`
pub const DEFAULT_HTTP_PORT: u16 = 8090;

/// Request timeout applied by the HTTP transport
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Health status: success
pub const STATUS_OK: &str = "ok";

/// Health status: store unreachable
pub const STATUS_DEGRADED: &str = "degraded";

/// Field names used when rendering row filters for the query layer
pub mod fields {
    pub const CREATED_BY: &str = "created_by";
    pub const RECIPIENT: &str = "recipient_user";
    pub const PARENT_CREATED_BY: &str = "parent.created_by";
}
