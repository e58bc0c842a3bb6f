//! HTTP API for starting and stopping the recorder
//!
//! - POST /recording/start - Start a new recording
//! - POST /recording/stop - Stop, finalize, and upload the recording
//! - GET /recording/status - Query recorder status
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{AppState, SourceFactory};
