//! API Module
//!
//! HTTP handlers and routing for the storage admin API.
//!
//! # Endpoints
//! - `GET /health` - Store health probes
//! - `GET /stats` - Cache statistics
//! - `GET /quota` - Usage report
//! - `GET|POST /queue`, `DELETE /queue/:id` - Offline queue
//! - `POST /maintenance` - Run maintenance
//! - `GET /export`, `POST /import` - Snapshots
//! - `DELETE /data` - Full reset
//! - `GET|PUT|DELETE /store/:kind/:key` - Single values

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
