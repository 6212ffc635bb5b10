//! RAII reservation handle for the `reserve`/`commit`/`discard` path.
//!
//! A short-lived borrow that gives the caller a direct write target and
//! must be explicitly resolved with `commit` (publish) or `discard`
//! (undo) — there is no implicit "commit on drop," since a reservation
//! abandoned without either call is a caller bug that should surface
//! loudly rather than silently publish half-written data.

use crate::region::RegionId;
use crate::sigindex::Signature;

/// A reserved-but-not-yet-committed region. The data bytes are staged in
/// `payload`; call [`Queue::commit`](crate::Queue::commit) to publish or
/// [`Queue::discard`](crate::Queue::discard) to undo.
pub struct Reservation {
    pub(crate) region: RegionId,
    pub(crate) signature: Signature,
    pub(crate) payload: Vec<u8>,
    resolved: bool,
}

impl Reservation {
    pub(crate) fn new(region: RegionId, signature: Signature, capacity: usize) -> Self {
        Self {
            region,
            signature,
            payload: Vec::with_capacity(capacity),
            resolved: false,
        }
    }

    /// Direct write access to the staged payload buffer.
    pub fn payload_mut(&mut self) -> &mut Vec<u8> {
        &mut self.payload
    }

    /// The region this reservation claimed, useful for diagnostics.
    #[must_use]
    pub fn region(&self) -> RegionId {
        self.region
    }

    pub(crate) fn mark_resolved(mut self) -> (RegionId, Signature, Vec<u8>) {
        self.resolved = true;
        (self.region, self.signature, std::mem::take(&mut self.payload))
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.resolved {
            tracing::warn!(
                region = self.region,
                "reservation dropped without commit or discard; the region remains reserved until the next open"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_mut_allows_staging_bytes() {
        let mut reservation = Reservation::new(7, [1; 16], 16);
        reservation.payload_mut().extend_from_slice(&[1, 2, 3]);
        assert_eq!(reservation.region(), 7);
        let (region, sig, payload) = reservation.mark_resolved();
        assert_eq!(region, 7);
        assert_eq!(sig, [1; 16]);
        assert_eq!(payload, vec![1, 2, 3]);
    }
}
