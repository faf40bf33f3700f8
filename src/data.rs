//! Items committed by a tree.
//!
//! An item knows how to produce its own digest given the tree's
//! [`TreeHasher`] and how to display itself. Leaves keep a reference to the
//! caller's item rather than a copy.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::hash::{Digest, TreeHasher};

/// A piece of data that can be hashed into a leaf.
///
/// ## `Data` and `Eq`
///
/// When implementing both `Data` and [`Eq`], it is important that the following
/// property holds:
///
/// ```text
/// k1 == k2 -> hash(k1) == hash(k2)
/// ```
///
/// Verification looks items up by digest only.
pub trait Data: fmt::Display + Send + Sync {
    /// Digest of this item with the tree's algorithm.
    fn hash(&self, hasher: &TreeHasher) -> Result<Digest>;
}

impl<D: Data + ?Sized> Data for &D {
    fn hash(&self, hasher: &TreeHasher) -> Result<Digest> {
        (**self).hash(hasher)
    }
}

impl<D: Data + ?Sized> Data for Box<D> {
    fn hash(&self, hasher: &TreeHasher) -> Result<Digest> {
        (**self).hash(hasher)
    }
}

/// UTF-8 string item, hashed as its raw bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct StringData {
    /// Wrapped value.
    pub value: String,
}

impl StringData {
    /// Wraps `value`.
    pub fn new<S: Into<String>>(value: S) -> StringData {
        StringData {
            value: value.into(),
        }
    }
}

impl From<&str> for StringData {
    fn from(value: &str) -> Self {
        StringData::new(value)
    }
}

impl From<String> for StringData {
    fn from(value: String) -> Self {
        StringData::new(value)
    }
}

impl Data for StringData {
    fn hash(&self, hasher: &TreeHasher) -> Result<Digest> {
        Ok(hasher.digest(self.value.as_bytes()))
    }
}

impl fmt::Display for StringData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// File item, hashed as the file's contents.
///
/// The file is read every time the item is hashed, so verification sees the
/// contents as they are at verify time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileData {
    path: PathBuf,
}

impl FileData {
    /// Refers to the file at `path`; nothing is opened yet.
    pub fn new<P: Into<PathBuf>>(path: P) -> FileData {
        FileData { path: path.into() }
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Data for FileData {
    fn hash(&self, hasher: &TreeHasher) -> Result<Digest> {
        let file = File::open(&self.path)
            .map_err(|e| Error::HashWriteFailure(format!("{}: {}", self.path.display(), e)))?;
        hasher.digest_reader(BufReader::new(file))
    }
}

impl fmt::Display for FileData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[cfg(test)]
mod data_test {
    use super::*;
    use crate::hash::HashKind;
    use std::io::Write;

    #[test]
    fn test_string_data() {
        let hasher = TreeHasher::new(HashKind::Sha256, false, true);
        let d = StringData::new("value1");
        assert_eq!(d.to_string(), "value1");
        assert_eq!(d.hash(&hasher).unwrap(), hasher.digest(b"value1"));

        let boxed: Box<dyn Data> = Box::new(d.clone());
        assert_eq!(boxed.hash(&hasher).unwrap(), d.hash(&hasher).unwrap());
    }

    #[test]
    fn test_file_data_hashes_contents() {
        let hasher = TreeHasher::new(HashKind::Sha256, false, false);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"value1").unwrap();
        file.flush().unwrap();

        let d = FileData::new(file.path());
        assert_eq!(d.hash(&hasher).unwrap(), StringData::new("value1").hash(&hasher).unwrap());
        assert_eq!(d.to_string(), file.path().display().to_string());
    }

    #[test]
    fn test_missing_file_is_write_failure() {
        let hasher = TreeHasher::new(HashKind::Sha256, false, false);
        let dir = tempfile::tempdir().unwrap();
        let d = FileData::new(dir.path().join("missing"));
        match d.hash(&hasher) {
            Err(Error::HashWriteFailure(msg)) => assert!(msg.contains("missing")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
