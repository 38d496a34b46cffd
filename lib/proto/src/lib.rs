//! Wire-level building blocks shared between the server and any tooling that
//! speaks the protocol: framing, the hand-rolled packet codec traits, RSA
//! transport encryption and the logging/time helpers used throughout the
//! rest of the workspace.

#![allow(clippy::len_without_is_empty)]

pub mod crypto;
pub mod logging;
pub mod shared;
pub mod time;

/// Protocol identifier sent during the handshake so mismatched clients and
/// servers fail fast instead of desyncing on garbled frames.
pub const PROTOCOL_ID: u16 = 0x4d4c; // "ML"

/// Opaque numeric identity assigned to a logged-in player for the lifetime
/// of their session.
pub type UserId = u64;
