//! HTTP surface.
//!
//! Maps inbound requests to store/relay operations and streams the
//! outbound event sequence. The single process-wide active-session id
//! lives here, not in the store.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
