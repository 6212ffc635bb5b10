use pq_core::{CreateOptions, Direction, Product, Queue};
use proptest::prelude::*;
use tempfile::tempdir;

fn product(sig_byte: u8, data_len: usize) -> Product {
    Product {
        origin: "origin".into(),
        feedtype: 1,
        seqno: u32::from(sig_byte),
        arrival: (1_000 + i64::from(sig_byte), 0),
        ident: format!("ident-{sig_byte}"),
        signature: [sig_byte; 16],
        data: vec![sig_byte; data_len],
    }
}

fn fresh_queue(capacity: u32, data_size: u64) -> (tempfile::TempDir, Queue) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pq.dat");
    let options = CreateOptions::new(0o600, 8, data_size, capacity);
    let queue = Queue::create(&path, options).unwrap();
    (dir, queue)
}

proptest! {
    /// For all sequences of inserts on a fresh queue of capacity N, the
    /// region table never reports more in-use slots than it has
    /// capacity for, and every insert is either accepted or rejected
    /// with a status the caller can act on (never silently dropped).
    #[test]
    fn insert_sequence_never_exceeds_capacity(sig_bytes in prop::collection::vec(1u8..=20, 1..20)) {
        let (_dir, mut queue) = fresh_queue(8, 8192);
        for b in sig_bytes {
            let _ = queue.insert(&product(b, 64));
            prop_assert!(queue.stats().slots_in_use <= 8);
        }
    }

    /// Idempotence of duplicate insert: inserting the same signature
    /// twice leaves exactly one product resident and reports `Dup` on
    /// the second attempt.
    #[test]
    fn duplicate_insert_is_idempotent(sig_byte in 1u8..=250) {
        let (_dir, mut queue) = fresh_queue(8, 8192);
        queue.insert(&product(sig_byte, 32)).unwrap();
        let before = queue.stats().slots_in_use;
        let result = queue.insert(&product(sig_byte, 32));
        prop_assert!(matches!(result, Err(pq_core::Error::Dup)));
        prop_assert_eq!(queue.stats().slots_in_use, before);
    }

    /// Every inserted product is visible to exactly one forward sequence
    /// pass before the queue reports end-of-queue.
    #[test]
    fn inserted_products_are_visible_exactly_once(sig_bytes in prop::collection::vec(1u8..=6, 1..6)) {
        let unique: std::collections::BTreeSet<u8> = sig_bytes.into_iter().collect();
        let (_dir, mut queue) = fresh_queue(16, 65536);
        for &b in &unique {
            queue.insert(&product(b, 32)).unwrap();
        }

        let mut seen = Vec::new();
        loop {
            let result = queue.sequence(Direction::Gt, None, |meta, _| {
                seen.push(meta.header.signature[15]);
                Ok(())
            });
            if matches!(result, Err(pq_core::Error::End)) {
                break;
            }
            result.unwrap();
        }
        let seen_set: std::collections::BTreeSet<u8> = seen.iter().copied().collect();
        prop_assert_eq!(seen.len(), seen_set.len(), "no duplicate deliveries");
        prop_assert_eq!(seen_set, unique);
    }
}
