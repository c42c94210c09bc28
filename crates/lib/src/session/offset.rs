//! Offset tracking: the watermark of the next sequence id to request.

use crate::channels::InboundMessage;

/// Advance `current` past every message in `batch` with `sequence_id >= current`.
/// Stale or redelivered ids (below `current`) are ignored, so the result never regresses.
pub fn advance(current: i64, batch: &[InboundMessage]) -> i64 {
    batch
        .iter()
        .filter(|m| m.sequence_id >= current)
        .map(|m| m.sequence_id + 1)
        .fold(current, i64::max)
}

/// Starting offset derived from a zero-wait drain of everything already pending.
pub fn initial(pending: &[InboundMessage]) -> i64 {
    advance(0, pending)
}
