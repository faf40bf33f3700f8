use std::fmt;
use std::sync::{Arc, OnceLock};

use log::{debug, trace, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::cancel::CancelToken;
use crate::data::Data;
use crate::error::{Error, Result};
use crate::hash::{Digest, TreeHasher};
use crate::node::{Node, NodeId};

/// Options used to build and verify a tree.
#[derive(Clone, Debug)]
pub struct TreeConfig {
    /// Algorithm, pairing sort and pooling.
    pub hasher: TreeHasher,
    /// Upper bound on concurrent hashing workers.
    pub max_concurrency: usize,
}

/// Merkle Tree.
///
/// All leafs and nodes are stored in a linear arena (vec), leafs first,
/// then each level above, ending with the root.
///
/// A merkle tree is a tree in which every non-leaf node is the hash of its
/// children nodes. A diagram depicting how it works:
///
/// ```text
///         root = h1234 = h(h12 + h34)
///        /                           \
///  h12 = h(h1 + h2)            h34 = h(h3 + h4)
///   /            \              /            \
/// h1 = h(tx1)  h2 = h(tx2)    h3 = h(tx3)  h4 = h(tx4)
/// ```
///
/// In memory layout:
///
/// ```text
///     [h1 h2 h3 h4 h12 h34 root]
/// ```
///
/// An odd number of items gets one extra padding leaf wrapping the last
/// item, so the leaf level is always even. On the levels above, a single
/// leftover node is paired with itself instead.
pub struct MerkleTree<'a, D: ?Sized> {
    nodes: Vec<Node<'a, D>>,
    leafs: usize,
    height: usize,
    root: Option<NodeId>,
    config: TreeConfig,
}

/// Collects the configuration of a tree before building it.
///
/// The worker pool is started by the first [`TreeBuilder::build`] and reused
/// by later builds from the same builder and from clones taken after it.
#[derive(Clone, Debug, Default)]
pub struct TreeBuilder {
    hasher: Option<TreeHasher>,
    max_concurrency: usize,
    workers: OnceLock<Arc<ThreadPool>>,
}

impl TreeBuilder {
    /// Builder with nothing set; both the hasher and the concurrency limit
    /// must be provided before [`TreeBuilder::build`].
    pub fn new() -> TreeBuilder {
        TreeBuilder::default()
    }

    /// Sets the hasher.
    pub fn with_hasher(mut self, hasher: TreeHasher) -> TreeBuilder {
        self.hasher = Some(hasher);
        self
    }

    /// Sets the upper bound on concurrent workers. Zero is rejected at build
    /// time.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> TreeBuilder {
        self.max_concurrency = max_concurrency;
        self.workers = OnceLock::new();
        self
    }

    /// Validated configuration.
    pub fn config(&self) -> Result<TreeConfig> {
        let hasher = self
            .hasher
            .clone()
            .ok_or_else(|| Error::ConfigInvalid("the merkle tree hasher cannot be empty".into()))?;
        if self.max_concurrency == 0 {
            return Err(Error::ConfigInvalid(
                "the merkle tree max concurrency cannot be equal to 0".into(),
            ));
        }
        Ok(TreeConfig {
            hasher,
            max_concurrency: self.max_concurrency,
        })
    }

    /// Builds the tree committing to `data`, in order.
    ///
    /// Leaves are hashed in parallel, then each level is reduced in parallel
    /// with a barrier between levels. The first worker error (or
    /// cancellation) aborts the build; no partial tree is returned.
    pub fn build<'a, D: Data>(&self, ctx: &CancelToken, data: &'a [D]) -> Result<MerkleTree<'a, D>> {
        let config = self.config()?;
        if data.is_empty() {
            return Err(Error::EmptyInput);
        }
        ctx.check()?;

        let workers = self.workers(config.max_concurrency)?;

        let mut nodes = generate_leaf_nodes(&config.hasher, &workers, ctx, data)?;
        let leafs = nodes.len();
        let (root, height) = generate_parent_nodes(&config.hasher, &workers, ctx, &mut nodes, leafs)?;

        debug!(
            "merkle tree built: items={} leafs={} nodes={} height={} root={:x}",
            data.len(),
            leafs,
            nodes.len(),
            height,
            nodes[root.index()].digest()
        );

        Ok(MerkleTree {
            nodes,
            leafs,
            height,
            root: Some(root),
            config,
        })
    }

    fn workers(&self, max_concurrency: usize) -> Result<Arc<ThreadPool>> {
        if let Some(workers) = self.workers.get() {
            return Ok(Arc::clone(workers));
        }
        let workers = Arc::new(worker_pool(max_concurrency)?);
        Ok(Arc::clone(self.workers.get_or_init(|| workers)))
    }
}

// Never more threads than the machine can run, never more than asked for.
fn worker_pool(max_concurrency: usize) -> Result<ThreadPool> {
    let threads = max_concurrency.min(rayon::current_num_threads()).max(1);
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("pmerkle-worker-{}", i))
        .build()
        .map_err(|e| Error::ConfigInvalid(format!("cannot start {} workers: {}", threads, e)))
}

/// Hashes every item into its own pre-reserved slot, appends the padding
/// leaf for odd counts, then sorts the level by digest if sorting is on.
fn generate_leaf_nodes<'a, D: Data>(
    hasher: &TreeHasher,
    workers: &ThreadPool,
    ctx: &CancelToken,
    data: &'a [D],
) -> Result<Vec<Node<'a, D>>> {
    if data.is_empty() {
        return Err(Error::EmptyInput);
    }

    let is_uneven = data.len() % 2 == 1;
    let mut slots: Vec<Option<Node<'a, D>>> = Vec::with_capacity(data.len() + 1);
    slots.resize_with(data.len(), || None);

    workers.install(|| {
        slots
            .par_iter_mut()
            .zip(data.par_iter())
            .try_for_each(|(slot, item)| -> Result<()> {
                ctx.check()?;
                let leaf = Node::leaf(hasher, item)?;
                trace!("new leaf: val<{}>=hash<{:x}>", item, leaf.digest());
                *slot = Some(leaf);
                Ok(())
            })
    })?;

    let mut leaves: Vec<Node<'a, D>> = Vec::with_capacity(data.len() + 1);
    leaves.extend(slots.into_iter().flatten());
    debug_assert_eq!(leaves.len(), data.len());

    // Duplicate the last item into a leaf of its own to get an even count.
    if is_uneven {
        let last = &data[data.len() - 1];
        let leaf = Node::padding(hasher, last)?;
        trace!("new padding leaf: val<{}>=hash<{:x}>", last, leaf.digest());
        leaves.push(leaf);
    }

    if hasher.is_sort() {
        leaves.sort_by(|a, b| a.digest().cmp(b.digest()));
    }

    Ok(leaves)
}

/// Reduces the arena level by level until one node remains. The first
/// `leafs` nodes of the arena form the bottom level.
///
/// Returns the root id and the height (number of levels, leafs included).
fn generate_parent_nodes<'a, D: ?Sized + Sync>(
    hasher: &TreeHasher,
    workers: &ThreadPool,
    ctx: &CancelToken,
    nodes: &mut Vec<Node<'a, D>>,
    leafs: usize,
) -> Result<(NodeId, usize)> {
    if leafs == 0 || nodes.len() < leafs {
        return Err(Error::EmptyInput);
    }

    let mut read_start = 0;
    let mut width = leafs;
    let mut height = 1;

    while width > 1 {
        ctx.check()?;

        let write_start = read_start + width;
        let next_width = (width + 1) / 2;

        let layer: Vec<Node<'a, D>> = {
            let level = &nodes[read_start..write_start];
            let mut slots: Vec<Option<Node<'a, D>>> = Vec::with_capacity(next_width);
            slots.resize_with(next_width, || None);

            workers.install(|| {
                slots
                    .par_iter_mut()
                    .enumerate()
                    .try_for_each(|(c, slot)| -> Result<()> {
                        ctx.check()?;

                        let left = 2 * c;
                        // A leftover node is hashed with itself to keep the tree binary.
                        let right = if left + 1 == width { left } else { left + 1 };

                        let (left_id, right_id) = (NodeId(read_start + left), NodeId(read_start + right));
                        let parent = Node::parent(hasher, left_id, &level[left], right_id, &level[right]);
                        trace!(
                            "new parent: val<{:x},{:x}>=hash<{:x}>",
                            level[left].digest(),
                            level[right].digest(),
                            parent.digest()
                        );

                        let parent_id = NodeId(write_start + c);
                        let linked = level[left].set_parent(parent_id);
                        debug_assert!(linked, "node {} already has a parent", read_start + left);
                        if right_id != left_id {
                            let linked = level[right].set_parent(parent_id);
                            debug_assert!(linked, "node {} already has a parent", read_start + right);
                        }

                        *slot = Some(parent);
                        Ok(())
                    })
            })?;

            slots.into_iter().flatten().collect()
        };
        debug_assert_eq!(layer.len(), next_width);

        debug!("merkle level {} reduced: {} -> {} nodes", height, width, next_width);
        nodes.extend(layer);

        read_start = write_start;
        width = next_width;
        height += 1;
    }

    Ok((NodeId(read_start), height))
}

impl<'a, D: ?Sized> MerkleTree<'a, D> {
    /// Tree without leaves or root. Verifying against it is always false.
    pub fn empty(config: TreeConfig) -> MerkleTree<'a, D> {
        MerkleTree {
            nodes: Vec::new(),
            leafs: 0,
            height: 0,
            root: None,
            config,
        }
    }

    /// Root node id.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Root digest, committing to every item.
    pub fn root_digest(&self) -> Option<&Digest> {
        self.root.map(|id| self.nodes[id.index()].digest())
    }

    /// Leaf level, in pairing order (digest order if sorting is on). Includes
    /// the padding leaf, if any.
    pub fn leaves(&self) -> &[Node<'a, D>] {
        &self.nodes[..self.leafs]
    }

    /// Number of leafs, padding included.
    pub fn leaf_count(&self) -> usize {
        self.leafs
    }

    /// Number of levels, leafs included.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True for a tree without nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node<'a, D>> {
        self.nodes.get(id.index())
    }

    /// Configuration the tree was built with.
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node<'a, D> {
        &mut self.nodes[id.index()]
    }
}

impl<'a, D: Data + ?Sized> MerkleTree<'a, D> {
    /// Checks that a leaf holding `data` is committed by the root.
    ///
    /// Finds the first leaf whose digest matches, then walks its parents up
    /// to the root. At every parent both children are recomputed (items are
    /// rehashed, internal children are recombined from their own children)
    /// and compared to the parent's stored digest; any mismatch is `false`.
    ///
    /// Unknown items are `Ok(false)`; errors are reserved for digests that
    /// could not be computed and for cancellation.
    pub fn verify<Q: Data + ?Sized>(&self, ctx: &CancelToken, data: &Q) -> Result<bool> {
        if self.leafs == 0 {
            warn!("tree is empty or doesn't contain any nodes");
            return Ok(false);
        }
        ctx.check()?;

        let hasher = &self.config.hasher;
        let hash = data.hash(hasher)?;

        let leaf = match self.leaves().iter().position(|leaf| *leaf.digest() == hash) {
            Some(i) => NodeId(i),
            None => return Ok(false),
        };

        let mut current = self.nodes[leaf.index()].parent_id();
        while let Some(id) = current {
            ctx.check()?;
            let parent = &self.nodes[id.index()];
            let (left, right) = match parent.children() {
                Some(children) => children,
                None => return Ok(false),
            };

            let left_hash = self.compute_node_hash(left)?;
            let right_hash = self.compute_node_hash(right)?;
            if hasher.combine(&left_hash, &right_hash) != *parent.digest() {
                debug!("digest mismatch at node {}", id.index());
                return Ok(false);
            }

            current = parent.parent_id();
        }

        Ok(true)
    }

    // A leaf is H(data); an internal node is H(left || right) of its children.
    fn compute_node_hash(&self, id: NodeId) -> Result<Digest> {
        let node = &self.nodes[id.index()];
        let hasher = &self.config.hasher;
        match (node.data(), node.children()) {
            (Some(data), _) => data.hash(hasher),
            (None, Some((left, right))) => Ok(hasher.combine(
                self.nodes[left.index()].digest(),
                self.nodes[right.index()].digest(),
            )),
            (None, None) => Ok(*node.digest()),
        }
    }
}

impl<'a, D: fmt::Display + ?Sized> fmt::Debug for MerkleTree<'a, D> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MerkleTree")
            .field("leafs", &self.leafs)
            .field("height", &self.height)
            .field("root", &self.root.map(|id| self.nodes[id.index()].digest()))
            .field("config", &self.config)
            .finish()
    }
}
