//! The JSON-RPC engine for Partyline.
//!
//! One [`RpcEngine`] serves one connection, in both directions:
//!
//! 1. **Outbound calls**: [`RpcEngine::call`] assigns the next id, parks a
//!    response callback in the pending table and hands the encoded frame
//!    to a [`FrameSink`].
//! 2. **Inbound frames**: [`RpcEngine::on_frame_received`] decodes a frame
//!    and either completes a pending call, runs a registered
//!    [`MethodHandler`], or replies with a standard error.
//! 3. **Hardening**: pending calls are failed when they outlive
//!    [`EngineConfig::call_timeout`] or when the connection closes, so a
//!    silent peer never leaks a callback.
//!
//! # How it fits in the stack
//!
//! ```text
//! Party layer (above)      ← registers "message"/"party" handlers, issues calls
//!     ↕
//! RPC engine (this crate)  ← correlation and dispatch
//!     ↕
//! Transport (below)        ← implements FrameSink, feeds inbound frames
//! ```

mod config;
mod engine;
mod handler;

pub use config::EngineConfig;
pub use engine::RpcEngine;
pub use handler::{FrameSink, MethodHandler, ResponseCallback};
