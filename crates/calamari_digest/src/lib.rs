#![deny(missing_docs)]

//! Content identity for files that are consolidated into a Calamari package.
//!
//! Every file is identified by the MD5 digest of its raw bytes, rendered as 32
//! lowercase hexadecimal characters. The digest only serves to detect identical
//! content, it is not meant to protect against tampering.
//!
//! # Examples
//!
//! ```
//! use calamari_digest::{compute_bytes_hash, compute_reader_hash};
//!
//! let hash = compute_bytes_hash("Hello, world!");
//! assert_eq!(hash.to_string(), "6cd3556deb0da54bca060b4c39479839");
//!
//! let streamed = compute_reader_hash(&mut "Hello, world!".as_bytes()).unwrap();
//! assert_eq!(hash, streamed);
//! ```
//!
//! # Available functions
//!
//! - [`compute_bytes_hash`]: Hashes an in-memory buffer.
//! - [`compute_reader_hash`]: Hashes everything a reader yields.
//! - [`compute_file_hash`]: Hashes a file on disk.
//! - [`HashingReader`]: Wraps a reader and hashes the bytes that pass through it.

#[cfg(feature = "serde")]
mod serde;

use std::{
    fmt,
    io::{Read, Write},
    path::Path,
    str::FromStr,
};

use digest::{Digest, Output};

pub use digest;
pub use md5::Md5;

/// A type alias for the raw output of an MD5 hash.
pub type Md5Hash = Output<Md5>;

/// The number of bytes in a [`ContentHash`].
pub const CONTENT_HASH_LEN: usize = 16;

/// The identity of a piece of content.
///
/// Displays as lowercase hex. Ordering matches the ordinal ordering of the hex
/// representation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; CONTENT_HASH_LEN]);

impl ContentHash {
    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; CONTENT_HASH_LEN] {
        &self.0
    }
}

impl From<Md5Hash> for ContentHash {
    fn from(output: Md5Hash) -> Self {
        let mut bytes = [0u8; CONTENT_HASH_LEN];
        bytes.copy_from_slice(&output);
        Self(bytes)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({self})")
    }
}

/// An error returned when a string is not a valid [`ContentHash`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("'{0}' is not a valid content hash, expected 32 hexadecimal characters")]
pub struct ParseContentHashError(String);

impl FromStr for ContentHash {
    type Err = ParseContentHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; CONTENT_HASH_LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| ParseContentHashError(s.to_owned()))?;
        Ok(Self(bytes))
    }
}

/// Compute the hash of the specified bytes.
pub fn compute_bytes_hash(bytes: impl AsRef<[u8]>) -> ContentHash {
    Md5::digest(bytes).into()
}

/// Compute the hash of all the bytes that can be read from `reader`.
pub fn compute_reader_hash(reader: &mut impl Read) -> std::io::Result<ContentHash> {
    let mut hasher = Md5::new();
    std::io::copy(reader, &mut hasher)?;
    Ok(hasher.finalize().into())
}

/// Compute the hash of the file at the specified location.
pub fn compute_file_hash(path: impl AsRef<Path>) -> std::io::Result<ContentHash> {
    let mut file = fs_err::File::open(path.as_ref())?;
    compute_reader_hash(&mut file)
}

/// A [`Read`] implementation that hashes all bytes read through it. Call
/// [`HashingReader::finalize`] to get back the wrapped reader and the hash.
pub struct HashingReader<R> {
    reader: R,
    hasher: Md5,
}

impl<R> HashingReader<R> {
    /// Constructs a new instance from a reader and a new (empty) hasher.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            hasher: Md5::new(),
        }
    }

    /// Consumes this instance and returns the original reader and the hash of
    /// all bytes read from this instance.
    pub fn finalize(self) -> (R, ContentHash) {
        (self.reader, self.hasher.finalize().into())
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let bytes_read = self.reader.read(buf)?;
        self.hasher.update(&buf[..bytes_read]);
        Ok(bytes_read)
    }
}

/// Consumes `reader` entirely, copying its bytes to `writer`, and returns the
/// hash of everything copied.
pub fn copy_and_hash(reader: impl Read, writer: &mut impl Write) -> std::io::Result<ContentHash> {
    let mut reader = HashingReader::new(reader);
    std::io::copy(&mut reader, writer)?;
    let (_, hash) = reader.finalize();
    Ok(hash)
}
