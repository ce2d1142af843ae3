//! File server with RFC 7232/7233 conditional and byte-range responses
//!
//! Serves a directory tree under `/files/`, accepts uploads on `/upload`,
//! and answers GET/HEAD with 200, 206, 304, 412 or 416 as the request's
//! validators and `Range` header dictate.

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod resource;
pub mod server;
