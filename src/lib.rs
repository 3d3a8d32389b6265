//! Single-threaded, event-driven static-file HTTP/1.0 server.
//!
//! One reactor thread owns a `mio::Poll` and every connection; requests
//! are framed byte by byte, parsed, validated, confined to the document
//! root, and answered, all without blocking the loop.

pub mod buffer;
pub mod config;
pub mod conn;
pub mod registry;
pub mod request;
pub mod resolve;
pub mod response;
pub mod server;
