//! Request handler module
//!
//! Routing, the file tree, uploads, and the content responder that turns an
//! opened resource into a 200/206/304/412/416 response.

pub mod content;
pub mod files;
pub mod listing;
pub mod router;
pub mod upload;

// Re-export main entry point
pub use router::handle_request;
