//! IMAP command tag generator.
//!
//! Tags are used to match commands with their responses.

/// Tag generator for IMAP commands.
///
/// Generates sequential tags as four lowercase hexadecimal digits: `0000`,
/// `0001`, ..., `ffff`. The counter wraps after `ffff`; since only one
/// command is ever outstanding, a wrapped tag cannot collide with a live one.
#[derive(Debug, Clone, Default)]
pub struct TagGenerator {
    counter: u16,
}

impl TagGenerator {
    /// Creates a new tag generator starting at `0000`.
    #[must_use]
    pub const fn new() -> Self {
        Self { counter: 0 }
    }

    /// Generates the next tag.
    pub fn next_tag(&mut self) -> String {
        let n = self.counter;
        self.counter = self.counter.wrapping_add(1);
        format!("{n:04x}")
    }

    /// Returns the current counter value without incrementing.
    #[must_use]
    pub const fn current(&self) -> u16 {
        self.counter
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_generation() {
        let mut generator = TagGenerator::default();
        assert_eq!(generator.next_tag(), "0000");
        assert_eq!(generator.next_tag(), "0001");
        assert_eq!(generator.next_tag(), "0002");
    }

    #[test]
    fn test_hex_format() {
        let mut generator = TagGenerator::new();
        for _ in 0..10 {
            let _ = generator.next_tag();
        }
        assert_eq!(generator.next_tag(), "000a");
        for _ in 11..255 {
            let _ = generator.next_tag();
        }
        assert_eq!(generator.next_tag(), "00ff");
    }

    #[test]
    fn test_current() {
        let mut generator = TagGenerator::default();
        assert_eq!(generator.current(), 0);
        let _ = generator.next_tag();
        assert_eq!(generator.current(), 1);
    }

    #[test]
    fn test_uniqueness() {
        let mut generator = TagGenerator::default();
        let mut seen = std::collections::HashSet::new();

        for _ in 0..10000 {
            let tag = generator.next_tag();
            assert!(seen.insert(tag), "duplicate tag generated");
        }
    }

    #[test]
    fn test_wraps_after_ffff() {
        let mut generator = TagGenerator { counter: u16::MAX };
        assert_eq!(generator.next_tag(), "ffff");
        assert_eq!(generator.next_tag(), "0000");
    }
}
