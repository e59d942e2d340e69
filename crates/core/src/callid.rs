//! Tool-call ID generation.
//!
//! Providers sometimes omit the `id` on a tool call (always, for the
//! content-embedded dialects). The agent needs ids to be unique within a
//! conversation so tool responses can be matched back to their calls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static CALL_SEQ: AtomicU64 = AtomicU64::new(0);

/// Generate a unique tool-call id of the form `call_<nanos>_<seq>`.
///
/// The sequence counter is process-global and atomic, so two ids generated
/// within the same wallclock nanosecond still differ.
pub fn generate_call_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = CALL_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("call_{nanos}_{seq}")
}
