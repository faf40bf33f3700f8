//! Tree vertices.
//!
//! Nodes live in a single arena owned by the tree and refer to each other by
//! [`NodeId`]. A leaf wraps a caller item; an internal node references exactly
//! two children (the same id twice when a leftover node is paired with
//! itself). The parent link is a plain id, written once when the parent is
//! created and only read afterwards.

use std::fmt;
use std::sync::OnceLock;

use crate::data::Data;
use crate::error::Result;
use crate::hash::{Digest, TreeHasher};

/// Position of a node in the tree arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Arena index.
    pub fn index(&self) -> usize {
        self.0
    }
}

enum NodeKind<'a, D: ?Sized> {
    Leaf { data: &'a D, is_padding: bool },
    Internal { left: NodeId, right: NodeId },
}

/// Leaf or internal node of a [`MerkleTree`](crate::MerkleTree).
pub struct Node<'a, D: ?Sized> {
    digest: Digest,
    kind: NodeKind<'a, D>,
    parent: OnceLock<NodeId>,
}

impl<'a, D: Data + ?Sized> Node<'a, D> {
    /// `leaf(item) = hash(item)`.
    pub fn leaf(hasher: &TreeHasher, data: &'a D) -> Result<Node<'a, D>> {
        Self::new_leaf(hasher, data, false)
    }

    /// Leaf appended to balance an odd item count; wraps the same item as
    /// the last real leaf but is a node of its own.
    pub fn padding(hasher: &TreeHasher, data: &'a D) -> Result<Node<'a, D>> {
        Self::new_leaf(hasher, data, true)
    }

    fn new_leaf(hasher: &TreeHasher, data: &'a D, is_padding: bool) -> Result<Node<'a, D>> {
        Ok(Node {
            digest: data.hash(hasher)?,
            kind: NodeKind::Leaf { data, is_padding },
            parent: OnceLock::new(),
        })
    }
}

impl<'a, D: ?Sized> Node<'a, D> {
    /// `parent(left, right) = combine(left.digest, right.digest)`.
    ///
    /// Children's back references are not touched here: the caller knows
    /// where the parent lands in the arena.
    pub fn parent(
        hasher: &TreeHasher,
        left_id: NodeId,
        left: &Node<'a, D>,
        right_id: NodeId,
        right: &Node<'a, D>,
    ) -> Node<'a, D> {
        Node {
            digest: hasher.combine(&left.digest, &right.digest),
            kind: NodeKind::Internal {
                left: left_id,
                right: right_id,
            },
            parent: OnceLock::new(),
        }
    }

    /// Stored digest.
    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    /// Wrapped item, for leaves.
    pub fn data(&self) -> Option<&'a D> {
        match self.kind {
            NodeKind::Leaf { data, .. } => Some(data),
            NodeKind::Internal { .. } => None,
        }
    }

    /// `(left, right)` child ids, for internal nodes.
    pub fn children(&self) -> Option<(NodeId, NodeId)> {
        match self.kind {
            NodeKind::Leaf { .. } => None,
            NodeKind::Internal { left, right } => Some((left, right)),
        }
    }

    /// True for nodes without children.
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    /// True only for the leaf manufactured to even out the leaf count.
    pub fn is_padding(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { is_padding: true, .. })
    }

    /// Parent id; `None` for the root.
    pub fn parent_id(&self) -> Option<NodeId> {
        self.parent.get().copied()
    }

    /// Links this node to its parent. Returns false if a parent was already
    /// recorded, in which case the link is left unchanged.
    pub(crate) fn set_parent(&self, parent: NodeId) -> bool {
        self.parent.set(parent).is_ok()
    }

    #[cfg(test)]
    pub(crate) fn digest_mut(&mut self) -> &mut Digest {
        &mut self.digest
    }
}

impl<'a, D: fmt::Display + ?Sized> fmt::Debug for Node<'a, D> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut s = f.debug_struct("Node");
        s.field("digest", &self.digest);
        match &self.kind {
            NodeKind::Leaf { data, is_padding } => {
                s.field("data", &format_args!("{}", data));
                s.field("is_padding", is_padding);
            }
            NodeKind::Internal { left, right } => {
                s.field("left", left);
                s.field("right", right);
            }
        }
        s.field("parent", &self.parent.get()).finish()
    }
}

#[cfg(test)]
mod node_test {
    use super::*;
    use crate::data::StringData;
    use crate::hash::HashKind;

    #[test]
    fn test_leaf_and_padding() {
        let hasher = TreeHasher::new(HashKind::Sha256, false, false);
        let item = StringData::new("value5");

        let leaf = Node::leaf(&hasher, &item).unwrap();
        let pad = Node::padding(&hasher, &item).unwrap();

        assert!(leaf.is_leaf() && pad.is_leaf());
        assert!(!leaf.is_padding());
        assert!(pad.is_padding());
        assert_eq!(leaf.digest(), pad.digest());
        assert_eq!(pad.data().map(|d| d.to_string()), Some("value5".to_string()));
        assert_eq!(leaf.children(), None);
    }

    #[test]
    fn test_parent_links_once() {
        let hasher = TreeHasher::new(HashKind::Sha256, false, true);
        let a = StringData::new("a");
        let b = StringData::new("b");
        let l = Node::leaf(&hasher, &a).unwrap();
        let r = Node::leaf(&hasher, &b).unwrap();

        let p = Node::parent(&hasher, NodeId(0), &l, NodeId(1), &r);
        assert!(!p.is_leaf());
        assert_eq!(p.children(), Some((NodeId(0), NodeId(1))));
        assert_eq!(p.data(), None);
        assert_eq!(*p.digest(), hasher.combine(l.digest(), r.digest()));

        assert_eq!(l.parent_id(), None);
        assert!(l.set_parent(NodeId(2)));
        assert!(!l.set_parent(NodeId(3)));
        assert_eq!(l.parent_id(), Some(NodeId(2)));
    }
}
