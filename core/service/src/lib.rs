pub mod api;
pub mod config;
pub mod state;
pub mod telemetry;

pub use api::{router, ApiError};
pub use config::{ConfigArgs, ServiceConfig};
pub use state::AppState;
