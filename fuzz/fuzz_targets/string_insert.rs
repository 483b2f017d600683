#![no_main]
use libfuzzer_sys::fuzz_target;

use std::collections::BTreeMap;

use durable_btree_index::{BtreeConfig, BtreeIndex, Error};

fuzz_target!(|data: Vec<(String, String)>| {
    let dir = tempfile::tempdir().unwrap();
    let mut m = BTreeMap::default();
    let mut fixture: BtreeIndex<String, String> = BtreeIndex::open(
        dir.path().join("fuzz.db"),
        BtreeConfig::default().minimum_degree(2),
    )
    .unwrap();

    for (key, value) in data {
        if m.contains_key(&key) {
            assert!(matches!(
                fixture.insert(key, value),
                Err(Error::DuplicateKey)
            ));
        } else {
            m.insert(key.clone(), value.clone());
            fixture.insert(key, value).unwrap();
        }
    }

    for (k, v1) in m.iter() {
        let v2 = fixture.find(k).unwrap();
        assert_eq!(Some(v1.clone()), v2);
    }
});
