//! Operational HTTP endpoints. Dispatching is not exposed over HTTP.

mod health;
mod metrics;
mod routes;

pub use health::{health, HealthResponse};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
