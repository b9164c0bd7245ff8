//! Property-based tests for the detached output buffer

use proptest::prelude::*;
use tabmux::bridge::OutputBuffer;

fn chunks() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..32)
}

proptest! {
    #[test]
    fn test_buffer_keeps_most_recent_tail(capacity in 1usize..128, chunks in chunks()) {
        let mut buffer = OutputBuffer::new(capacity);
        let mut all = Vec::new();
        for chunk in &chunks {
            buffer.push(chunk);
            all.extend_from_slice(chunk);
            prop_assert!(buffer.len() <= capacity);
        }

        let kept = all.len().min(capacity);
        prop_assert_eq!(buffer.contents(), all[all.len() - kept..].to_vec());
    }

    #[test]
    fn test_every_byte_is_kept_or_evicted(capacity in 1usize..128, chunks in chunks()) {
        let mut buffer = OutputBuffer::new(capacity);
        let mut total = 0u64;
        let mut reported = 0u64;
        for chunk in &chunks {
            reported += buffer.push(chunk) as u64;
            total += chunk.len() as u64;
        }

        prop_assert_eq!(reported, buffer.evicted_bytes());
        prop_assert_eq!(buffer.evicted_bytes() + buffer.len() as u64, total);
    }

    #[test]
    fn test_drain_hands_out_buffer_once(
        capacity in 1usize..128,
        before in chunks(),
        after in chunks(),
    ) {
        let mut buffer = OutputBuffer::new(capacity);
        for chunk in &before {
            buffer.push(chunk);
        }
        let expected = buffer.contents();
        prop_assert_eq!(buffer.drain(), expected);
        prop_assert!(buffer.is_empty());

        let mut rest = Vec::new();
        for chunk in &after {
            buffer.push(chunk);
            rest.extend_from_slice(chunk);
        }
        let kept = rest.len().min(capacity);
        prop_assert_eq!(buffer.drain(), rest[rest.len() - kept..].to_vec());
    }
}
