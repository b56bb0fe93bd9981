//! HTTP front end for the CV builder: accounts, sessions, CVs, templates,
//! share links, PDF jobs and payments.
//!
//! All business rules live in `cvbuilder-core`; this crate maps them onto
//! routes, cookies and status codes.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod rate_limit;
pub mod router;
pub mod state;

pub use config::{Environment, ServerConfig};
pub use error::{ApiError, ApiResponse, ApiResult};
pub use router::build_router;
pub use state::AppState;
