//! Helpers for the session's `compressed_through_round` counter.
//!
//! A round is one user message plus one agent response, so a message index
//! maps to `index / 2` completed rounds.

/// Number of complete rounds that fit before `message_index`.
pub fn round_for_message_index(message_index: usize) -> usize {
    message_index / 2
}

/// Clamp a compression counter so it never covers rounds past
/// `message_index`. Returns the new value only when it changed.
pub fn clamp_compressed_round(current: usize, message_index: usize) -> Option<usize> {
    let limit = round_for_message_index(message_index);
    (current > limit).then_some(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_are_message_pairs() {
        assert_eq!(round_for_message_index(0), 0);
        assert_eq!(round_for_message_index(1), 0);
        assert_eq!(round_for_message_index(4), 2);
        assert_eq!(round_for_message_index(7), 3);
    }

    #[test]
    fn clamp_reports_only_changes() {
        assert_eq!(clamp_compressed_round(4, 4), Some(2));
        assert_eq!(clamp_compressed_round(4, 0), Some(0));
        assert_eq!(clamp_compressed_round(2, 4), None);
        assert_eq!(clamp_compressed_round(1, 10), None);
    }
}
