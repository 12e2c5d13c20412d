//! Property tests for the sequence-set algebra.

#![allow(clippy::unwrap_used)]

use postbox_imap::{ErrorKind, SequenceSet};
use proptest::prelude::*;

fn numbers() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(1u32..5000, 0..200)
}

fn sorted(set: &SequenceSet) -> Vec<u32> {
    let mut v = set.to_array().unwrap();
    v.sort_unstable();
    v
}

proptest! {
    #[test]
    fn combine_is_commutative(a in numbers(), b in numbers()) {
        let a = SequenceSet::uid_set(a).unwrap();
        let b = SequenceSet::uid_set(b).unwrap();
        let ab = a.combine(&b).unwrap();
        let ba = b.combine(&a).unwrap();
        prop_assert!(ab.is_uid());
        prop_assert_eq!(sorted(&ab), sorted(&ba));
    }

    #[test]
    fn combine_is_associative(a in numbers(), b in numbers(), c in numbers()) {
        let a = SequenceSet::set(a).unwrap();
        let b = SequenceSet::set(b).unwrap();
        let c = SequenceSet::set(c).unwrap();
        let left = a.combine(&b).unwrap().combine(&c).unwrap();
        let right = a.combine(&b.combine(&c).unwrap()).unwrap();
        prop_assert_eq!(sorted(&left), sorted(&right));
    }

    #[test]
    fn contiguous_run_chunks_to_one_range(from in 1u32..10_000, len in 1u32..300) {
        let set = SequenceSet::uid_set(from..=from + len).unwrap();
        let chunks = set.split_into_chunks(len as usize + 1).unwrap();
        prop_assert_eq!(chunks.len(), 1);
        prop_assert_eq!(chunks[0].to_string(), format!("{from}:{}", from + len));
    }

    #[test]
    fn combine_rejects_mixed_addressing(a in numbers(), b in numbers()) {
        let seq = SequenceSet::set(a).unwrap();
        let uid = SequenceSet::uid_set(b).unwrap();
        prop_assert_eq!(seq.combine(&uid).unwrap_err().kind(), ErrorKind::InvalidArgument);
        prop_assert_eq!(uid.combine(&seq).unwrap_err().kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn chunks_cover_the_set_in_order(list in numbers(), size in 1usize..64) {
        let set = SequenceSet::set(list.clone()).unwrap();
        let chunks = set.split_into_chunks(size).unwrap();
        prop_assert_eq!(chunks.len(), list.len().div_ceil(size));
        prop_assert!(chunks.iter().all(|c| c.to_array().unwrap().len() <= size));
        let flattened: Vec<u32> = chunks.iter().flat_map(|c| c.to_array().unwrap()).collect();
        prop_assert_eq!(flattened, list);
    }

    #[test]
    fn range_renders_compactly(from in 1u32..100_000, len in 0u32..1000) {
        let set = SequenceSet::range(from, from + len).unwrap();
        let rendered = set.to_string();
        if len == 0 {
            prop_assert_eq!(rendered, from.to_string());
        } else {
            prop_assert_eq!(rendered, format!("{from}:{}", from + len));
        }
    }
}

#[test]
fn saved_result_is_never_split() {
    let saved = SequenceSet::uid_saved_result();
    assert_eq!(saved.split_into_chunks(1).unwrap(), vec![saved.clone()]);
    assert_eq!(saved.to_string(), "$");
}

#[test]
fn open_ranges_cannot_be_enumerated() {
    let open = SequenceSet::all_from(3).unwrap();
    assert_eq!(open.to_array().unwrap_err().kind(), ErrorKind::Unsupported);
    assert_eq!(open.split_into_chunks(10).unwrap_err().kind(), ErrorKind::Unsupported);
    assert_eq!(open.to_string(), "3:*");
}
