use std::fmt;

use crate::cancel::CancelToken;
use crate::data::{Data, StringData};
use crate::error::{Error, Result};
use crate::hash::{Digest, HashKind, TreeHasher};
use crate::merkle::{MerkleTree, TreeBuilder};

pub const DEFAULT_MAX_CONCURRENCY: usize = 1000;

pub fn items(values: &[&str]) -> Vec<StringData> {
    values.iter().map(|&v| StringData::new(v)).collect()
}

pub fn numbered_items(n: usize) -> Vec<StringData> {
    (0..n).map(|i| StringData::new(format!("value{}", i + 1))).collect()
}

pub fn hasher(sort: bool, reuse: bool) -> TreeHasher {
    TreeHasher::new(HashKind::Sha256, sort, reuse)
}

pub fn builder(sort: bool, reuse: bool) -> TreeBuilder {
    TreeBuilder::new()
        .with_hasher(hasher(sort, reuse))
        .with_max_concurrency(DEFAULT_MAX_CONCURRENCY)
}

pub fn build<D: Data>(data: &[D], sort: bool, reuse: bool) -> MerkleTree<'_, D> {
    builder(sort, reuse)
        .build(&CancelToken::new(), data)
        .expect("failed to build tree")
}

pub fn leaf_hash(h: &TreeHasher, value: &str) -> Digest {
    h.digest(value.as_bytes())
}

/// Item whose digest can't be computed.
#[derive(Debug)]
pub struct FailingData;

impl Data for FailingData {
    fn hash(&self, _: &TreeHasher) -> Result<Digest> {
        Err(Error::HashWriteFailure("broken item".into()))
    }
}

impl fmt::Display for FailingData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("failing")
    }
}

/// Item that cancels the build it is part of when hashed.
#[derive(Debug)]
pub struct CancellingData(pub CancelToken);

impl Data for CancellingData {
    fn hash(&self, h: &TreeHasher) -> Result<Digest> {
        self.0.cancel();
        Ok(h.digest(b"cancel"))
    }
}

impl fmt::Display for CancellingData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("cancelling")
    }
}
