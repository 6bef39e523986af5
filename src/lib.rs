//! Reporting API over a video game sales database.
//!
//! Each endpoint builds a parameterized query, normalizes what comes back
//! into a display table and renders it as an HTML table, JSON rows or a PNG
//! chart.

pub mod chart;
pub mod config;
pub mod error;
pub mod normalize;
pub mod params;
pub mod query;
pub mod render;
pub mod reports;
pub mod routes;
pub mod snapshot;
pub mod state;
pub mod store;

pub use config::{Args, ReportConfig};
pub use error::ReportError;
pub use routes::router;
pub use state::AppState;
pub use store::Store;
