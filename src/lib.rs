//! Parallel _Merkle Tree_ implementation.
//!
//! Merkle tree (MT) implemented as a binary tree whose nodes are allocated in
//! a single arena (vec), leafs first and the root last. Leafs are hashed
//! concurrently, then each level is reduced concurrently with a barrier
//! between levels, on a worker pool bounded by the configured concurrency.
//!
//! Hashing scheme:
//!
//! ```text
//! leaf(d)    = ALG(d)
//! node(l, r) = ALG(l || r)            (sort off)
//! node(l, r) = ALG(min(l,r) || max(l,r)) (sort on)
//! ```
//!
//! An odd leaf count gets a padding leaf that wraps the last item again; an
//! odd count on any level above pairs the leftover node with itself. With
//! sorting on, the leaf level is also ordered by digest before pairing.
//!
//! Link: [](https://en.wikipedia.org/wiki/Merkle_tree)
//!
//! # Implementation choices
//!
//! Hash engines follow the [`std::hash::Hasher`] stream model ([`Algorithm`])
//! and are selected from a closed set of [`HashKind`]s. Engines and
//! concatenation buffers may be leased from shared [`Pools`]; leases are
//! returned on drop so no exit path leaks pool capacity.
//!
//! Parent links are arena ids written once, so the tree has a single owner
//! and no reference cycles.
//!
//! # Interface
//!
//! ```text
//! - TreeBuilder::new().with_hasher(h).with_max_concurrency(n).build(ctx, items) -> tree
//! - tree.root_digest() -> digest
//! - tree.verify(ctx, item) -> bool
//! ```
//!
//! # Quick start
//!
//! ```
//! use pmerkle::{CancelToken, HashKind, StringData, TreeBuilder, TreeHasher};
//!
//! let items: Vec<StringData> = ["value1", "value2", "value3"]
//!     .iter()
//!     .map(|&v| StringData::new(v))
//!     .collect();
//!
//! let ctx = CancelToken::new();
//! let tree = TreeBuilder::new()
//!     .with_hasher(TreeHasher::new(HashKind::Sha256, false, true))
//!     .with_max_concurrency(4)
//!     .build(&ctx, &items)
//!     .unwrap();
//!
//! assert_eq!(tree.leaf_count(), 4);
//! assert!(tree.verify(&ctx, &StringData::new("value2")).unwrap());
//! assert!(!tree.verify(&ctx, &StringData::new("value4")).unwrap());
//! ```

#![deny(
    missing_docs,
    missing_debug_implementations,
    unsafe_code,
    unused_import_braces
)]
#![warn(unused_qualifications, trivial_casts, trivial_numeric_casts)]

mod cancel;
pub use cancel::CancelToken;

mod data;
pub use data::{Data, FileData, StringData};

mod error;
pub use error::{Error, Result};

/// Hash infrastructure for items and nodes.
pub mod hash;
pub use hash::{Algorithm, Digest, HashKind, Sha256Algorithm, TreeHasher, DIGEST_LEN};

/// Reusable engines and buffers.
pub mod pool;
pub use pool::Pools;

mod node;
pub use node::{Node, NodeId};

mod merkle;
pub use merkle::{MerkleTree, TreeBuilder, TreeConfig};

/// Layered settings for the command line front end.
pub mod config;

/// Command line front end.
pub mod cli;

#[cfg(test)]
mod test_common;
