//! Server configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

/// Default HTTP port for the filedeck server.
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default bind address (localhost only for security).
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// Header carrying the authenticated username, set by the fronting proxy.
pub const DEFAULT_AUTH_HEADER: &str = "X-Forwarded-User";

/// Default data root; each user's scope lives beneath it.
pub const DEFAULT_ROOT: &str = "/srv/filedeck";

/// Route prefix for resource CRUD.
pub const RESOURCES_PREFIX: &str = "/api/resources";

/// Route prefix for disk usage.
pub const USAGE_PREFIX: &str = "/api/usage";
