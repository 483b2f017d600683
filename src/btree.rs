use std::mem;
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::file::RecordFile;

use node::{ChildEdge, Element, Node, NodeRecord};

mod node;

/// Minimum degree used when creating a new tree without an explicit setting.
///
/// Keeps typical encoded nodes near a file system page for small elements.
pub const DEFAULT_MINIMUM_DEGREE: usize = 128;

/// Configuration for creating or opening a [`BtreeIndex`].
#[derive(Debug, Clone)]
pub struct BtreeConfig {
    minimum_degree: usize,
    read_only: bool,
}

impl Default for BtreeConfig {
    fn default() -> Self {
        BtreeConfig {
            minimum_degree: DEFAULT_MINIMUM_DEGREE,
            read_only: false,
        }
    }
}

impl BtreeConfig {
    /// Set the minimum degree t of the tree, which fixes node occupancy to
    /// t-1 up to 2t-1 elements. Must be at least 2.
    ///
    /// Only used when creating a new tree; an existing tree keeps the degree
    /// it was created with.
    pub fn minimum_degree(mut self, minimum_degree: usize) -> Self {
        self.minimum_degree = minimum_degree;
        self
    }

    /// Open the storage for reading only.
    ///
    /// A read-only index never creates the temporary write side and refuses
    /// every mutation with [`Error::StorageReadOnly`].
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

/// Ordered map backed by a single file on disk, implemented as a B-tree.
///
/// Since serde is used to serialize the keys and values, both types need to
/// implement the [`Serialize`] and [`serde::Deserialize`] traits. Keys are
/// compared through their [`Ord`] implementation and are unique within the
/// index.
pub struct BtreeIndex<K, V>
where
    K: Serialize + DeserializeOwned + Ord + Clone,
    V: Serialize + DeserializeOwned + Clone,
{
    file: RecordFile<NodeRecord<K, V>>,
    root: Node<K, V>,
}

impl<K, V> BtreeIndex<K, V>
where
    K: Serialize + DeserializeOwned + Ord + Clone,
    V: Serialize + DeserializeOwned + Clone,
{
    /// Open the index file at `path`, creating a new empty tree if nothing
    /// has been committed there yet.
    ///
    /// The write side of the storage lives at `<path>.tmp` while an operation
    /// is in flight and must not be touched by callers.
    pub fn open(path: impl AsRef<Path>, config: BtreeConfig) -> Result<BtreeIndex<K, V>> {
        if config.minimum_degree < 2 {
            return Err(Error::MinimumDegreeTooSmall(config.minimum_degree));
        }

        let mut file = RecordFile::open(path, config.read_only)?;
        let root = match file.read_root()? {
            Some((offset, record)) => {
                let mut root = Node::from_record(record, offset)?;
                root.is_root = true;
                root
            }
            None => {
                let mut root = Node::new(config.minimum_degree, true);
                root.save(&mut file)?;
                file.commit()?;
                debug!(
                    minimum_degree = config.minimum_degree,
                    "created empty tree"
                );
                root
            }
        };

        Ok(BtreeIndex { file, root })
    }

    /// Search for a key in the index and return a copy of its value.
    pub fn find(&mut self, key: &K) -> Result<Option<V>> {
        self.root.find(key, &mut self.file)
    }

    /// Returns whether the index contains the given key.
    pub fn contains_key(&mut self, key: &K) -> Result<bool> {
        Ok(self.find(key)?.is_some())
    }

    /// Returns true if the index holds no elements.
    pub fn is_empty(&self) -> bool {
        self.root.elements.is_empty()
    }

    /// The minimum degree this tree was created with.
    pub fn minimum_degree(&self) -> usize {
        self.root.minimum_degree
    }

    /// Insert a new element into the index.
    ///
    /// Keys are unique; inserting an existing key fails with
    /// [`Error::DuplicateKey`]. The mutation becomes durable with the commit
    /// at the end of this call, and any failure before that point leaves the
    /// previously committed tree intact.
    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        match self.insert_element(Element { key, value }) {
            Ok(()) => Ok(()),
            Err(e @ Error::DuplicateKey) => Err(e),
            Err(e) => Err(Error::Insert(Box::new(e))),
        }
    }

    fn insert_element(&mut self, element: Element<K, V>) -> Result<()> {
        if self.root.is_full() {
            self.grow()?;
        }
        self.root.insert_non_full(element, &mut self.file)?;
        self.file.commit()
    }

    /// Replace the full root with a fresh internal root and split the old
    /// root below it. This is the only way the tree gains height, so all
    /// leaves stay at the same depth.
    fn grow(&mut self) -> Result<()> {
        let t = self.root.minimum_degree;
        let mut old_root = mem::replace(&mut self.root, Node::new(t, true));
        old_root.is_root = false;
        self.root
            .children
            .push(ChildEdge::Loaded(Box::new(old_root)));
        debug!("root was full, tree grows by one level");
        self.root.split_child(0, &mut self.file)
    }
}
