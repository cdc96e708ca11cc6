//! Wire protocol for Partyline.
//!
//! This crate defines the "language" the party client and the backend
//! speak over their shared socket:
//!
//! - **Types** ([`RpcMessage`], [`RequestId`], [`RpcError`]): the four
//!   JSON-RPC 2.0 envelope shapes.
//! - **Codec** ([`JsonRpcCodec`]): how those envelopes are converted to
//!   and from bytes, including the classification of malformed input.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding,
//!   and which standard error reply each failure maps to.
//!
//! # Architecture
//!
//! The protocol layer sits below the RPC engine. It has no state and
//! knows nothing about connections or pending calls.
//!
//! ```text
//! Transport (frames) → RPC engine (correlation) → Protocol (envelopes)
//! ```

mod codec;
mod error;
mod types;

pub use codec::JsonRpcCodec;
pub use error::ProtocolError;
pub use types::{ErrorCode, JSONRPC_VERSION, RequestId, RpcError, RpcMessage};
