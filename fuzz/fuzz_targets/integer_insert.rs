#![no_main]
use libfuzzer_sys::fuzz_target;

use std::collections::BTreeMap;

use durable_btree_index::{BtreeConfig, BtreeIndex, Error};

fuzz_target!(|data: (Vec<(u32, u32)>, u8)| {
    let minimum_degree = data.1.max(2) as usize;
    let dir = tempfile::tempdir().unwrap();
    let mut m = BTreeMap::default();
    let mut fixture: BtreeIndex<u32, u32> = BtreeIndex::open(
        dir.path().join("fuzz.db"),
        BtreeConfig::default().minimum_degree(minimum_degree),
    )
    .unwrap();

    for (key, value) in data.0 {
        if m.contains_key(&key) {
            // Keys are unique, re-inserting must be rejected.
            assert!(matches!(
                fixture.insert(key, value),
                Err(Error::DuplicateKey)
            ));
        } else {
            m.insert(key, value);
            fixture.insert(key, value).unwrap();
        }
    }

    // get query for each entry
    for (k, v1) in m.iter() {
        assert!(fixture.contains_key(k).unwrap());
        let v2 = fixture.find(k).unwrap();
        assert_eq!(Some(*v1), v2);
    }
});
