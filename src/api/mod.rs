//! API Module
//!
//! HTTP gateway over the document service.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Cache, queue and connectivity statistics
//! - `GET /collections/:collection` - List a collection (`?fresh=true` skips the cache)
//! - `POST /collections/:collection` - Add a document
//! - `GET /collections/:collection/:id` - Read one document
//! - `PATCH /collections/:collection/:id` - Merge fields into a document
//! - `DELETE /collections/:collection/:id` - Delete a document
//! - `GET /queue` - Inspect the offline queue
//! - `POST /sync` - Replay the offline queue
//! - `PUT /connectivity` - Report a connectivity change
//! - `DELETE /cache` - Clear the read cache

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
