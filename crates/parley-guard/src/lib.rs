//! Content guard: PII-like and keyword detection for message bodies.
//!
//! Everything here is pure. Detection never touches the network or storage,
//! so callers may run it on every message regardless of the workspace's
//! guard mode and decide enforcement separately with [`should_block`].

mod detect;

pub use detect::{MAX_MATCHED_VALUE_CHARS, detect_flags};

use parley_types::models::{Flag, GuardMode};

/// Reject the message only in block mode, on a minor thread, with findings.
pub fn should_block(guard_mode: GuardMode, is_minor_thread: bool, flags: &[Flag]) -> bool {
    guard_mode == GuardMode::Block && is_minor_thread && !flags.is_empty()
}
