//! Network Module
//!
//! UDP transport for the engine.
//!
//! ## Responsibilities
//! - Receive one request per datagram on the configured address
//! - Answer each request with one datagram to its sender
//! - Drive the engine's cooperative timer between requests
//! - Hand notifications to the delivery thread

mod server;

pub use server::Server;
