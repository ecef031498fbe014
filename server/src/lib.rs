//! # Motion Bridge Server Library
//!
//! This library provides the HTTP server that pairs a phone's motion sensors
//! with a polling block-programming client (PictoBlox). The phone posts raw
//! X/Y tilt samples under a session token; the client polls for a smoothed,
//! range-mapped view of the same session.
//!
//! ## Core Responsibilities
//!
//! ### Session Management
//! Handles the complete lifecycle of motion sessions including:
//! - Token generation with collision retry and capacity limits
//! - Per-session smoothing of incoming samples
//! - Update throttling for phones that report faster than useful
//! - Expiry and eviction of idle sessions
//!
//! ### Polling Reads
//! The polling client has no error handling, so every read endpoint answers
//! with a well-formed value. Unknown, stale and corrupted sessions all read as
//! the center value (`X05Y05` on the scale endpoint, `0` on the axis
//! endpoints).
//!
//! ## Architecture Design
//!
//! ### Shared Session Table
//! One `SessionStore` sits behind a `tokio::sync::RwLock` shared by the request
//! handlers and the background sweeper. Sessions are keyed independently, and
//! racing updates to the same token resolve last-write-wins since each update
//! is an absolute position report.
//!
//! ### Injected Time
//! Store operations take the current time as an argument. Handlers and the
//! sweeper read it from a [`clock::Clock`], which tests replace with a manual
//! clock.
//!
//! ## Module Organization
//!
//! - `session_store`: the session table, throttling, expiry and eviction
//! - `lifecycle`: the periodic sweep task
//! - `network`: axum routes and the bound server
//! - `config`: command-line arguments and server configuration
//! - `token`: token alphabets and generation
//! - `clock`: time sources
//! - `error`: error taxonomy for the write endpoints
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::clock::SystemClock;
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::new(ServerConfig::default(), Arc::new(SystemClock)).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod network;
pub mod session_store;
pub mod token;
