//! # Persistent single-file B-tree index
//!
//! `durable-btree-index` keeps an ordered key/value map in a single file on
//! disk, implemented as a B-tree of configurable minimum degree. This is
//! helpful if you
//!
//! - need an index that survives process restarts without an external
//!   database,
//! - want point lookups and inserts on datasets larger than memory, loading
//!   only the nodes a lookup passes, and
//! - need support for all serde-serializable key and value types with
//!   varying sizes.
//!
//! Because of its intended use case, it is therefore **not possible to**
//!
//! - delete entries once they are inserted,
//! - overwrite the value of an existing key (inserting a duplicate key is an
//!   error), or
//! - iterate over ranges of keys (use point lookups, or a different index
//!   structure).
//!
//! Every insert is published atomically: mutations are collected in a
//! temporary write side next to the index file and made visible by a single
//! rename, so the file always holds a complete, consistent tree.
//!
//! # Example
//!
//! ```rust
//! use durable_btree_index::{BtreeConfig, BtreeIndex, Error};
//!
//! fn main() -> std::result::Result<(), Error> {
//!     let dir = tempfile::tempdir().unwrap();
//!     let path = dir.path().join("index.db");
//!
//!     let mut b = BtreeIndex::open(&path, BtreeConfig::default())?;
//!     b.insert(1u16, 2u16)?;
//!     b.insert(200, 4)?;
//!     b.insert(20, 3)?;
//!
//!     assert_eq!(true, b.contains_key(&200)?);
//!     assert_eq!(false, b.contains_key(&2)?);
//!
//!     assert_eq!(Some(3), b.find(&20)?);
//!
//!     // The entries survive reopening the file.
//!     drop(b);
//!     let mut b: BtreeIndex<u16, u16> = BtreeIndex::open(&path, BtreeConfig::default())?;
//!     assert_eq!(Some(2), b.find(&1)?);
//!     Ok(())
//! }
//! ```
mod btree;
mod error;
mod file;

pub use btree::{BtreeConfig, BtreeIndex, DEFAULT_MINIMUM_DEGREE};
pub use error::{Error, Result};
