#![cfg(test)]

// Property tests for ChainedTable kept inside the crate so they can call
// the internal consistency check.

use crate::chained_table::{ChainedTable, Cursor, KeyWidth, PutOutcome, TableOptions};
use proptest::prelude::*;
use std::hash::{BuildHasher, Hasher};

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Put(usize, i32),
    Delete(usize),
    Get(usize),
    GetMut(usize, i32),
    Iterate,
    Cursor,
}

// Insertion-ordered reference model: a new key goes to the end, an update
// keeps its position, a delete closes the gap.
#[derive(Default)]
struct Model {
    entries: Vec<(Vec<u8>, i32)>,
}

impl Model {
    fn position(&self, k: &[u8]) -> Option<usize> {
        self.entries.iter().position(|(mk, _)| mk == k)
    }

    fn put(&mut self, k: &[u8], v: i32) -> Option<i32> {
        match self.position(k) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, v)),
            None => {
                self.entries.push((k.to_vec(), v));
                None
            }
        }
    }

    fn delete(&mut self, k: &[u8]) -> Option<i32> {
        self.position(k).map(|i| self.entries.remove(i).1)
    }

    fn get(&self, k: &[u8]) -> Option<i32> {
        self.position(k).map(|i| self.entries[i].1)
    }
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{1,5}", 1..=12).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Put(i, v)),
            2 => idx.clone().prop_map(OpI::Delete),
            1 => idx.clone().prop_map(OpI::Get),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::GetMut(i, v)),
            1 => Just(OpI::Iterate),
            1 => Just(OpI::Cursor),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn run_scenario<S: BuildHasher>(
    mut sut: ChainedTable<'_, i32, S>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model = Model::default();
    let mut last_size = sut.size();
    for op in ops {
        match op {
            OpI::Put(i, v) => {
                let k = pool[i].as_bytes();
                let expected = model.put(k, v);
                let outcome = sut.put(k.to_vec(), v).expect("string keys never fail");
                match expected {
                    Some(prev) => prop_assert_eq!(outcome, PutOutcome::Replaced(prev)),
                    None => prop_assert_eq!(outcome, PutOutcome::Inserted),
                }
            }
            OpI::Delete(i) => {
                let k = pool[i].as_bytes();
                prop_assert_eq!(sut.delete(k), model.delete(k));
                prop_assert!(!sut.contains_key(k));
            }
            OpI::Get(i) => {
                let k = pool[i].as_bytes();
                prop_assert_eq!(sut.get(k).copied(), model.get(k));
            }
            OpI::GetMut(i, v) => {
                let k = pool[i].as_bytes();
                if let Some(slot) = sut.get_mut(k) {
                    *slot = v;
                    prop_assert!(model.put(k, v).is_some());
                } else {
                    prop_assert!(model.get(k).is_none());
                }
            }
            OpI::Iterate => {
                let seen: Vec<(Vec<u8>, i32)> =
                    sut.iter().map(|(k, v)| (k.to_vec(), *v)).collect();
                prop_assert_eq!(&seen, &model.entries);
            }
            OpI::Cursor => {
                let mut cursor = Cursor::default();
                let mut seen = Vec::new();
                while let Some((k, v)) = sut.next_entry(&mut cursor).expect("no mutation") {
                    seen.push((k.to_vec(), *v));
                }
                prop_assert_eq!(&seen, &model.entries);
            }
        }

        // Post-conditions after each op
        // 1) Count parity with the model
        prop_assert_eq!(sut.count(), model.entries.len());
        // 2) Buckets only ever grow, and stay a power of two
        prop_assert!(sut.size() >= last_size);
        prop_assert!(sut.size().is_power_of_two());
        last_size = sut.size();
        // 3) Bucket chains and the insertion ring agree
        sut.assert_consistent();
    }
    Ok(())
}

// Property: State-machine equivalence against an insertion-ordered model.
// Invariants exercised across random operation sequences:
// - Duplicate puts update in place and report the displaced value.
// - `get`/`delete` parity; deleted keys vanish from lookups and iteration.
// - `iter` and the detached cursor both yield exactly the model order.
// - `count` parity, grow-only power-of-two buckets, chain/ring agreement.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let sut = ChainedTable::with_options(TableOptions::new(1, KeyWidth::Str)).unwrap();
        run_scenario(sut, &pool, ops)?;
    }
}

// Collision variant using a constant hasher to stress equality resolution.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Property: Same state-machine invariants as above with every key in one
// bucket chain, so deletes hit the head, middle and tail of the chain.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let sut = ChainedTable::with_options_and_hasher(
            TableOptions::new(4, KeyWidth::Str),
            ConstBuildHasher,
        )
        .unwrap();
        run_scenario(sut, &pool, ops)?;
    }
}
