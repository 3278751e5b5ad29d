//! Rust client SDK for the Twitter realtime filter stream.
//!
//! The crate is organized by concern:
//! - `config`: connection options, credential material, and validation.
//! - `auth`: OAuth 1.0a request signing.
//! - `stream`: realtime stream client, frame decoding, liveness watchdog,
//!   and typed events.

/// OAuth 1.0a request signing.
pub mod auth;
/// Connection options and credential material.
pub mod config;
/// Realtime stream client, decoder, watchdog, and event types.
pub mod stream;
