//! filedeck HTTP server.
//!
//! Exposes the kernel's [`ResourceService`](filedeck_kernel::ResourceService)
//! over a small JSON API:
//!
//! | Method | Route | |
//! |---|---|---|
//! | GET | `/api/resources/{path}` | entry, listing, or checksum |
//! | POST | `/api/resources/{path}` | upload (or mkdir with trailing `/`) |
//! | PUT | `/api/resources/{path}` | overwrite existing file |
//! | PATCH | `/api/resources/{path}` | copy / rename |
//! | DELETE | `/api/resources/{path}` | recursive delete |
//! | GET | `/api/usage/{path}` | disk usage |

pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use auth::{Session, UserDirectory};
pub use config::{ConfigError, ServerConfig};
pub use error::ApiError;
pub use router::router;
pub use state::AppState;
