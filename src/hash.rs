//! Hash infrastructure for items and nodes of the tree.
//!
//! [`Algorithm`] follows the [`Hasher`] stream model: bytes are written into
//! the engine and [`Algorithm::hash`] returns the full length digest. Engines
//! are created from a closed set of [`HashKind`]s and handed out by
//! [`TreeHasher`], either fresh or leased from a [`Pools`] instance.

use std::fmt;
use std::hash::Hasher;
use std::io::Read;
use std::str::FromStr;
use std::sync::Arc;

use ring::digest::{Context, SHA256};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pool::{BufferLease, EngineLease, Pools};

/// Length in bytes of a digest produced by any supported algorithm.
pub const DIGEST_LEN: usize = 32;

/// Capacity of a concatenation buffer: two digests side by side.
pub const BUFFER_LEN: usize = 2 * DIGEST_LEN;

/// Fixed size digest of a leaf or a node.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// Wraps raw digest bytes.
    pub const fn new(bytes: [u8; DIGEST_LEN]) -> Digest {
        Digest(bytes)
    }

    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl From<[u8; DIGEST_LEN]> for Digest {
    fn from(bytes: [u8; DIGEST_LEN]) -> Self {
        Digest(bytes)
    }
}

impl fmt::LowerHex for Digest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            f.write_str("0x")?;
        }
        for b in self.0.iter() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::LowerHex::fmt(self, f)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Digest({:x})", self)
    }
}

/// Supported hashing algorithms.
///
/// Identifiers are validated against this closed set; anything else fails
/// with [`Error::HashNotSupported`] instead of falling back to a default.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HashKind {
    /// SHA-256, 256 bit digests.
    Sha256,
}

impl HashKind {
    /// Canonical identifier, as accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            HashKind::Sha256 => "sha256",
        }
    }

    /// Creates a fresh, empty engine for this algorithm.
    pub fn engine(&self) -> Box<dyn Algorithm> {
        match self {
            HashKind::Sha256 => Box::new(Sha256Algorithm::new()),
        }
    }
}

impl FromStr for HashKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sha256" => Ok(HashKind::Sha256),
            other => Err(Error::HashNotSupported(other.to_string())),
        }
    }
}

impl TryFrom<String> for HashKind {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<HashKind> for String {
    fn from(kind: HashKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for HashKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hashing engine.
///
/// Algorithm conforms standard [`Hasher`] trait and provides methods to return
/// full length digest and reset current state.
pub trait Algorithm: Hasher + Send {
    /// Returns the digest of the data stream written so far. The engine is
    /// left empty afterwards.
    fn hash(&mut self) -> Digest;

    /// Reset engine state.
    fn reset(&mut self);
}

/// SHA-256 engine backed by `ring`.
#[derive(Clone)]
pub struct Sha256Algorithm(Context);

impl Sha256Algorithm {
    /// Creates an empty engine.
    pub fn new() -> Sha256Algorithm {
        Sha256Algorithm(Context::new(&SHA256))
    }
}

impl Default for Sha256Algorithm {
    fn default() -> Sha256Algorithm {
        Sha256Algorithm::new()
    }
}

impl fmt::Debug for Sha256Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Sha256Algorithm")
    }
}

impl Hasher for Sha256Algorithm {
    #[inline]
    fn write(&mut self, msg: &[u8]) {
        self.0.update(msg)
    }

    /// First eight bytes of the current digest, big endian.
    fn finish(&self) -> u64 {
        let d = self.0.clone().finish();
        let mut h = [0u8; 8];
        h.copy_from_slice(&d.as_ref()[..8]);
        u64::from_be_bytes(h)
    }
}

impl Algorithm for Sha256Algorithm {
    /// ring's `Context` is consumed on `finish`, so the finished context is
    /// swapped out for a fresh one.
    #[inline]
    fn hash(&mut self) -> Digest {
        let ctx = std::mem::replace(&mut self.0, Context::new(&SHA256));
        let mut h = [0u8; DIGEST_LEN];
        h.copy_from_slice(ctx.finish().as_ref());
        Digest(h)
    }

    #[inline]
    fn reset(&mut self) {
        self.0 = Context::new(&SHA256);
    }
}

/// Algorithm selection plus the knobs shared by build and verify.
///
/// Cloning is cheap: pools are shared behind an `Arc`.
#[derive(Clone, Debug)]
pub struct TreeHasher {
    kind: HashKind,
    sort: bool,
    pools: Option<Arc<Pools>>,
}

impl TreeHasher {
    /// Creates a hasher. With `reuse` set, engines and concatenation buffers
    /// are leased from shared pools instead of being allocated per use.
    pub fn new(kind: HashKind, sort: bool, reuse: bool) -> TreeHasher {
        TreeHasher {
            kind,
            sort,
            pools: if reuse {
                Some(Arc::new(Pools::new(kind)))
            } else {
                None
            },
        }
    }

    /// Parses the algorithm identifier before creating the hasher.
    pub fn from_name(name: &str, sort: bool, reuse: bool) -> Result<TreeHasher> {
        Ok(TreeHasher::new(name.parse()?, sort, reuse))
    }

    /// Selected algorithm.
    pub fn kind(&self) -> HashKind {
        self.kind
    }

    /// Whether digest pairs (and the leaf level) are sorted before pairing.
    pub fn is_sort(&self) -> bool {
        self.sort
    }

    /// Shared pools, if reuse is enabled.
    pub fn pools(&self) -> Option<&Pools> {
        self.pools.as_deref()
    }

    /// Leases a reset engine, or creates one when pooling is disabled.
    pub fn engine(&self) -> EngineLease<'_> {
        match &self.pools {
            Some(pools) => pools.engines.lease(),
            None => EngineLease::detached(self.kind.engine()),
        }
    }

    /// Leases a concatenation buffer of [`BUFFER_LEN`] bytes. Pooled buffers
    /// are not zeroed.
    pub fn buffer(&self) -> BufferLease<'_> {
        match &self.pools {
            Some(pools) => pools.buffers.lease(),
            None => BufferLease::detached(),
        }
    }

    /// Digest of a byte slice.
    pub fn digest(&self, bytes: &[u8]) -> Digest {
        let mut engine = self.engine();
        engine.write(bytes);
        engine.hash()
    }

    /// Digest of everything readable from `reader`. Read failures surface
    /// as [`Error::HashWriteFailure`].
    pub fn digest_reader<R: Read>(&self, mut reader: R) -> Result<Digest> {
        let mut engine = self.engine();
        let mut chunk = [0u8; 8192];
        loop {
            let n = reader
                .read(&mut chunk)
                .map_err(|e| Error::HashWriteFailure(e.to_string()))?;
            if n == 0 {
                break;
            }
            engine.write(&chunk[..n]);
        }
        Ok(engine.hash())
    }

    /// Orders a digest pair for combination. With sorting enabled the
    /// lexicographically smaller digest comes first.
    pub fn order<'d>(&self, d1: &'d Digest, d2: &'d Digest) -> (&'d Digest, &'d Digest) {
        if self.sort && d1 > d2 {
            (d2, d1)
        } else {
            (d1, d2)
        }
    }

    /// `hash(first || second)` where the pair is ordered by [`TreeHasher::order`].
    pub fn combine(&self, d1: &Digest, d2: &Digest) -> Digest {
        let (first, second) = self.order(d1, d2);

        let mut buf = self.buffer();
        buf[..DIGEST_LEN].copy_from_slice(first.as_ref());
        buf[DIGEST_LEN..].copy_from_slice(second.as_ref());

        let mut engine = self.engine();
        engine.write(&buf);
        engine.hash()
    }
}

#[cfg(test)]
mod hash_test {
    use super::*;

    #[test]
    fn test_sha256_known_answer() {
        let hasher = TreeHasher::new(HashKind::Sha256, false, false);
        assert_eq!(
            format!("{}", hasher.digest(b"hello")),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_engine_is_empty_after_hash() {
        let mut a = Sha256Algorithm::new();
        a.write(b"hello");
        let h1 = a.hash();
        a.write(b"hello");
        assert_eq!(h1, a.hash());

        a.write(b"garbage");
        a.reset();
        a.write(b"hello");
        assert_eq!(h1, a.hash());
    }

    #[test]
    fn test_hash_kind_closed_set() {
        assert_eq!("sha256".parse::<HashKind>(), Ok(HashKind::Sha256));
        assert_eq!(
            "md5".parse::<HashKind>(),
            Err(Error::HashNotSupported("md5".to_string()))
        );
        assert_eq!(
            "SHA256".parse::<HashKind>(),
            Err(Error::HashNotSupported("SHA256".to_string()))
        );
        assert!(TreeHasher::from_name("unknown", true, true).is_err());
    }

    #[test]
    fn test_combine_concatenates_both_operands() {
        let h1 = Digest::new([0x11; DIGEST_LEN]);
        let h2 = Digest::new([0x22; DIGEST_LEN]);

        let mut concat = Vec::with_capacity(BUFFER_LEN);
        concat.extend_from_slice(h1.as_ref());
        concat.extend_from_slice(h2.as_ref());

        for reuse in [false, true] {
            let hasher = TreeHasher::new(HashKind::Sha256, false, reuse);
            assert_eq!(hasher.combine(&h1, &h2), hasher.digest(&concat));
        }
    }

    #[test]
    fn test_combine_commutes_only_when_sorted() {
        let sorted = TreeHasher::new(HashKind::Sha256, true, true);
        let unsorted = TreeHasher::new(HashKind::Sha256, false, true);

        for (a, b) in [("a", "b"), ("value1", "value2"), ("zzz", "aaa")] {
            let d1 = sorted.digest(a.as_bytes());
            let d2 = sorted.digest(b.as_bytes());
            assert_eq!(sorted.combine(&d1, &d2), sorted.combine(&d2, &d1));
            assert_ne!(unsorted.combine(&d1, &d2), unsorted.combine(&d2, &d1));
        }
    }

    #[test]
    fn test_sort_puts_smaller_first() {
        let hasher = TreeHasher::new(HashKind::Sha256, true, false);
        let lo = Digest::new([0x01; DIGEST_LEN]);
        let hi = Digest::new([0xfe; DIGEST_LEN]);
        assert_eq!(hasher.order(&hi, &lo), (&lo, &hi));
        assert_eq!(hasher.order(&lo, &hi), (&lo, &hi));
    }

    #[test]
    fn test_digest_reader_matches_digest() {
        let hasher = TreeHasher::new(HashKind::Sha256, false, true);
        let data = vec![7u8; 20_000];
        assert_eq!(
            hasher.digest_reader(&data[..]).expect("read from slice"),
            hasher.digest(&data)
        );
    }

    #[test]
    fn test_digest_hex_format() {
        let d = Digest::new([0xab; DIGEST_LEN]);
        assert_eq!(format!("{:#x}", d), format!("0x{}", "ab".repeat(DIGEST_LEN)));
    }
}
