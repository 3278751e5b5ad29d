//! Realtime stream modules.
//!
//! - `client`: connection lifecycle, reconnect handling, and record
//!   dispatch.
//! - `decoder`: delimiter framing over arbitrarily chunked bytes.
//! - `events`: typed event surface for application consumers.
//! - `proto`: record shapes and classification.
//! - `watchdog`: stall detection timer.

/// Connection lifecycle and record dispatch.
pub mod client;
/// Frame reassembly and classification.
pub mod decoder;
/// Typed events and the subscriber registry.
pub mod events;
/// Record shapes.
pub mod proto;
/// Stall detection timer.
pub mod watchdog;
