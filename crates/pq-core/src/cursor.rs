//! The sequencing cursor and search direction.

use crate::timeindex::TimeKey;

/// Direction of a `sequence` search relative to the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Strictly less than the cursor (walking backward in time).
    Lt,
    /// Strictly greater than the cursor (walking forward in time).
    Gt,
    /// Exactly the cursor's current time key.
    Eq,
}

/// A consumer's position in the time domain. Unset until the first
/// `sequence` call, which initializes it to the sentinel opposite the
/// search direction (so a `Gt` search starts before every product, and a
/// `Lt` search starts after every product).
#[derive(Debug, Clone, Copy, Default)]
pub struct Cursor {
    key: Option<TimeKey>,
}

impl Cursor {
    /// A cursor with no position yet.
    #[must_use]
    pub fn unset() -> Self {
        Self { key: None }
    }

    /// Directly sets the cursor, per the `set_cursor` API call.
    pub fn set(&mut self, key: TimeKey) {
        self.key = Some(key);
    }

    /// Current position, if any.
    #[must_use]
    pub fn get(&self) -> Option<TimeKey> {
        self.key
    }

    /// Resolves the key to search from for `direction`, initializing an
    /// unset cursor to the appropriate sentinel first.
    #[must_use]
    pub fn resolve_start(&mut self, direction: Direction) -> TimeKey {
        if let Some(key) = self.key {
            return key;
        }
        let sentinel = match direction {
            Direction::Gt => TimeKey::MIN,
            Direction::Lt => TimeKey::MAX,
            Direction::Eq => TimeKey::MIN,
        };
        self.key = Some(sentinel);
        sentinel
    }

    /// Rewinds the cursor by one resolution tick, per the "on callback
    /// failure, rewind so the product is revisited" contract.
    pub fn rewind_one_tick(&mut self) {
        if let Some(key) = self.key {
            self.key = Some(key.saturating_sub(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_cursor_resolves_to_direction_sentinel() {
        let mut forward = Cursor::unset();
        assert_eq!(forward.resolve_start(Direction::Gt), TimeKey::MIN);

        let mut backward = Cursor::unset();
        assert_eq!(backward.resolve_start(Direction::Lt), TimeKey::MAX);
    }

    #[test]
    fn set_cursor_is_returned_verbatim() {
        let mut cursor = Cursor::unset();
        cursor.set(42);
        assert_eq!(cursor.resolve_start(Direction::Gt), 42);
    }

    #[test]
    fn rewind_moves_back_exactly_one_tick() {
        let mut cursor = Cursor::unset();
        cursor.set(10);
        cursor.rewind_one_tick();
        assert_eq!(cursor.get(), Some(9));
    }
}
