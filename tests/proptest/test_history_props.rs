//! Property-based tests for command history

use proptest::prelude::*;
use tabmux::history::{HistoryBuffer, InputLineTracker};

proptest! {
    #[test]
    fn test_history_stays_bounded(
        capacity in 1usize..16,
        commands in prop::collection::vec("[a-c ]{0,3}", 0..64),
    ) {
        let history = HistoryBuffer::new(capacity);
        for command in &commands {
            history.push(command.clone());
            prop_assert!(history.len() <= capacity);
        }

        let entries = history.entries();
        prop_assert!(entries.iter().all(|e| !e.trim().is_empty()));
        prop_assert!(entries.windows(2).all(|pair| pair[0] != pair[1]));
    }

    #[test]
    fn test_newest_command_is_last(
        commands in prop::collection::vec("[a-z]{1,8}", 1..32),
        blanks in "[ \t]{0,4}",
    ) {
        let history = HistoryBuffer::default();
        for command in &commands {
            history.push(command.clone());
        }
        prop_assert!(!history.push(blanks));
        prop_assert_eq!(history.last(), commands.last().cloned());
    }

    #[test]
    fn test_tracker_ignores_chunk_boundaries(
        line in "[a-z][a-z0-9 ./-]{0,40}",
        split in 0usize..48,
    ) {
        let mut input = line.clone().into_bytes();
        input.push(b'\r');
        let split = split.min(input.len());

        let mut tracker = InputLineTracker::new();
        let mut lines = tracker.feed(&input[..split]);
        lines.extend(tracker.feed(&input[split..]));

        prop_assert_eq!(lines, vec![line.trim().to_string()]);
        prop_assert_eq!(tracker.pending(), "");
    }

    #[test]
    fn test_arrow_keys_never_reach_history(
        line in "[a-z]{1,20}",
        key in prop::sample::select(vec!["\x1b[A", "\x1b[B", "\x1b[C", "\x1b[D", "\x1bOA"]),
    ) {
        let mut tracker = InputLineTracker::new();
        let input = format!("{}{}\n", key, line);
        prop_assert_eq!(tracker.feed(input.as_bytes()), vec![line]);
    }
}
