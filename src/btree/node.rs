use std::cmp::Ordering;

use serde::{de::DeserializeOwned, Serialize};
use serde_derive::{Deserialize, Serialize as SerializeDerive};
use tracing::trace;

use crate::error::{Error, Result};
use crate::file::{decode_field, encode_field, RecordFile};

/// One key/value record of the index.
#[derive(SerializeDerive, Deserialize, Clone, Debug)]
pub struct Element<K, V> {
    pub key: K,
    pub value: V,
}

/// Wire form of a node, the unit that gets framed into a storage record.
///
/// Children are stored as their offsets, each rendered as a fixed-width
/// decimal string so a child reference always occupies a constant,
/// comparable field. The leaf flag is redundant with the children list but
/// part of the format.
#[derive(SerializeDerive, Deserialize)]
pub struct NodeRecord<K, V> {
    elements: Vec<Element<K, V>>,
    children: Vec<String>,
    minimum_degree: u64,
    is_leaf: bool,
}

/// Outcome of searching a key inside a single node.
pub enum SearchResult {
    /// Key found at this index.
    Found(usize),
    /// Key not present; it would belong at this index, which is also the
    /// child to descend into.
    NotFound(usize),
}

/// Reference from a node to one of its children.
///
/// A freshly decoded node only knows its children by offset. Edges are
/// loaded on demand and replaced in place, so operating on a node that is
/// not in memory is impossible by construction.
pub enum ChildEdge<K, V> {
    Unloaded(u64),
    Loaded(Box<Node<K, V>>),
}

impl<K, V> ChildEdge<K, V>
where
    K: Serialize + DeserializeOwned + Ord + Clone,
    V: Serialize + DeserializeOwned + Clone,
{
    /// Offset of the last persisted revision of this child, if any.
    fn offset(&self) -> Option<u64> {
        match self {
            ChildEdge::Unloaded(offset) => Some(*offset),
            ChildEdge::Loaded(node) => node.offset,
        }
    }

    /// Get the child node, reading it from storage on first access.
    pub fn load(&mut self, file: &mut RecordFile<NodeRecord<K, V>>) -> Result<&mut Node<K, V>> {
        if let ChildEdge::Unloaded(offset) = *self {
            let record = file.get(offset)?;
            let node = Node::from_record(record, offset)?;
            *self = ChildEdge::Loaded(Box::new(node));
        }
        match self {
            ChildEdge::Loaded(node) => Ok(node),
            ChildEdge::Unloaded(_) => unreachable!("edge was loaded right above"),
        }
    }
}

/// A single B-tree node of minimum degree t.
///
/// Non-root nodes hold between t-1 and 2t-1 elements in strictly ascending
/// key order. An internal node has one more child than elements, a leaf has
/// none. Only the root may underflow.
pub struct Node<K, V> {
    pub(crate) minimum_degree: usize,
    pub(crate) elements: Vec<Element<K, V>>,
    pub(crate) children: Vec<ChildEdge<K, V>>,
    /// Byte position of the last persisted revision of this node.
    pub(crate) offset: Option<u64>,
    /// The root is persisted through the root pointer, all other nodes are
    /// plain appends.
    pub(crate) is_root: bool,
}

impl<K, V> Node<K, V>
where
    K: Serialize + DeserializeOwned + Ord + Clone,
    V: Serialize + DeserializeOwned + Clone,
{
    /// Create an empty leaf node.
    pub fn new(minimum_degree: usize, is_root: bool) -> Node<K, V> {
        Node {
            minimum_degree,
            elements: Vec::new(),
            children: Vec::new(),
            offset: None,
            is_root,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.elements.len() == 2 * self.minimum_degree - 1
    }

    /// Binary search for `key` among this node's elements.
    pub fn search(&self, key: &K) -> SearchResult {
        match self.elements.binary_search_by(|e| e.key.cmp(key)) {
            Ok(i) => SearchResult::Found(i),
            Err(i) => SearchResult::NotFound(i),
        }
    }

    /// Look up `key` in the subtree below this node, loading children from
    /// storage as the descent passes them.
    pub fn find(&mut self, key: &K, file: &mut RecordFile<NodeRecord<K, V>>) -> Result<Option<V>> {
        match self.search(key) {
            SearchResult::Found(i) => Ok(Some(self.elements[i].value.clone())),
            SearchResult::NotFound(i) => {
                if self.is_leaf() {
                    Ok(None)
                } else {
                    self.children[i].load(file)?.find(key, file)
                }
            }
        }
    }

    /// Insert `element` into the subtree below this node.
    ///
    /// The caller guarantees that this node is not full. Any full child is
    /// split before descending into it, so the recursion never enters a full
    /// node and a split can always promote its median one level up.
    pub fn insert_non_full(
        &mut self,
        element: Element<K, V>,
        file: &mut RecordFile<NodeRecord<K, V>>,
    ) -> Result<()> {
        debug_assert!(!self.is_full());

        match self.search(&element.key) {
            SearchResult::Found(_) => Err(Error::DuplicateKey),
            SearchResult::NotFound(mut i) => {
                if self.is_leaf() {
                    self.elements.insert(i, element);
                    self.save(file)?;
                    Ok(())
                } else {
                    if self.children[i].load(file)?.is_full() {
                        self.split_child(i, file)?;
                        // The median moved up into position i, re-aim the
                        // descent relative to it.
                        match element.key.cmp(&self.elements[i].key) {
                            Ordering::Greater => i += 1,
                            Ordering::Equal => return Err(Error::DuplicateKey),
                            Ordering::Less => {}
                        }
                    }
                    self.children[i].load(file)?.insert_non_full(element, file)?;
                    self.save(file)?;
                    Ok(())
                }
            }
        }
    }

    /// Split the full child at index `i` into two siblings of t-1 elements
    /// each and promote the median element into this node.
    ///
    /// Left and right are persisted before this node so their fresh offsets
    /// can be referenced by it.
    pub fn split_child(
        &mut self,
        i: usize,
        file: &mut RecordFile<NodeRecord<K, V>>,
    ) -> Result<()> {
        let t = self.minimum_degree;
        let left = self.children[i].load(file)?;
        debug_assert!(left.is_full());

        let median = left.elements.remove(t - 1);
        let right_elements = left.elements.split_off(t - 1);
        let right_children = if left.is_leaf() {
            Vec::new()
        } else {
            left.children.split_off(t)
        };
        let mut right = Node {
            minimum_degree: t,
            elements: right_elements,
            children: right_children,
            offset: None,
            is_root: false,
        };

        left.save(file)?;
        right.save(file)?;

        self.elements.insert(i, median);
        self.children
            .insert(i + 1, ChildEdge::Loaded(Box::new(right)));
        self.save(file)?;

        trace!(child = i, "split full child");
        Ok(())
    }

    /// Persist this node, stamping the offset of the new revision.
    pub fn save(&mut self, file: &mut RecordFile<NodeRecord<K, V>>) -> Result<u64> {
        let record = self.to_record()?;
        let offset = if self.is_root {
            file.save_root(&record)?
        } else {
            file.append(&record)?
        };
        self.offset = Some(offset);
        Ok(offset)
    }

    fn to_record(&self) -> Result<NodeRecord<K, V>> {
        let mut children = Vec::with_capacity(self.children.len());
        for edge in &self.children {
            let offset = edge.offset().ok_or(Error::NodeNotPersisted)?;
            children.push(encode_field(offset));
        }
        Ok(NodeRecord {
            elements: self.elements.clone(),
            children,
            minimum_degree: self.minimum_degree as u64,
            is_leaf: self.is_leaf(),
        })
    }

    /// Rebuild a node from its decoded record, with all children unloaded.
    pub fn from_record(record: NodeRecord<K, V>, offset: u64) -> Result<Node<K, V>> {
        let mut children = Vec::with_capacity(record.children.len());
        for field in &record.children {
            let child_offset =
                decode_field(field.as_bytes()).map_err(|_| Error::InvalidRecord(offset))?;
            children.push(ChildEdge::Unloaded(child_offset));
        }
        let minimum_degree = usize::try_from(record.minimum_degree)
            .map_err(|_| Error::InvalidRecord(offset))?;
        Ok(Node {
            minimum_degree,
            elements: record.elements,
            children,
            offset: Some(offset),
            is_root: false,
        })
    }
}

#[cfg(test)]
mod tests;
