//! # ADM Player (admp-ap)
//!
//! Real-time multichannel audio player for a fixed speaker array.
//!
//! **Purpose:** Stream a large multichannel render file from disk in
//! bounded chunks, remap file channels to physical speaker outputs
//! through a static table, meter every output channel, and expose an
//! HTTP/SSE control interface.
//!
//! **Architecture:** Chunk-prefetching stream cache + per-callback render
//! engine over symphonia + cpal, with an axum control plane.

pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod playback;
pub mod routing;

pub use error::{Error, Result};
