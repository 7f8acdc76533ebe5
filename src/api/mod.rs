//! API Module
//!
//! HTTP handlers and routing for inspecting and driving the cache and the
//! smart fetcher.
//!
//! # Endpoints
//! - `PUT /entries` - Store a value
//! - `GET /entries/:key` - Retrieve a value
//! - `GET /entries/:key/exists` - Check presence without touching stats
//! - `DELETE /entries/:key` - Delete a key
//! - `POST /entries/preload` - Bulk insert of missing keys
//! - `POST /invalidate` - Remove keys by substring or regex
//! - `POST /clear` - Remove every entry
//! - `GET /stats` - Cache statistics
//! - `GET|PATCH /config` - Read or update the cache settings
//! - `GET|PUT /snapshot` - Export or import the cache
//! - `POST /fetch` - Fetch a URL through the smart fetcher
//! - `GET /fetch/stats` - Queue occupancy and response cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
