// src/digest.rs

//! Content digests
//!
//! A `Digest` is the 128-bit MD5 of a file's bytes; package identity (the
//! "TDS digest") is the digest of the sorted `(dos-path, file-digest)` pairs
//! of a package's non-manifest files. MD5 is used for content addressing
//! here, not for security; the repository signature is what clients verify.

use crate::dospath;
use crate::error::{Error, Result};
use md5::{Digest as _, Md5};
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

/// A 128-bit content digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 16]);

impl Digest {
    pub const LEN: usize = 16;

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Digest of a byte slice.
    pub fn of_bytes(data: &[u8]) -> Self {
        let mut hasher = Md5::new();
        hasher.update(data);
        Digest(hasher.finalize().into())
    }

    /// Digest of zero bytes. Used as the placeholder `lstdigest` before the
    /// final repository listing is known.
    pub fn empty() -> Self {
        Digest::of_bytes(&[])
    }

    /// Streaming digest of a file's contents.
    pub fn of_file(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut builder = DigestBuilder::new();
        let mut buffer = [0u8; 8192];
        loop {
            let n = file.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            builder.update(&buffer[..n]);
        }
        Ok(builder.finalize())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self)
    }
}

impl FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 32 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidManifest(format!("bad digest: {}", s)));
        }
        let mut bytes = [0u8; 16];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = u8::from_str_radix(&s[2 * i..2 * i + 2], 16).unwrap();
        }
        Ok(Digest(bytes))
    }
}

/// Incremental digest computation.
pub struct DigestBuilder {
    hasher: Md5,
}

impl DigestBuilder {
    pub fn new() -> Self {
        DigestBuilder { hasher: Md5::new() }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    pub fn finalize(self) -> Digest {
        Digest(self.hasher.finalize().into())
    }
}

impl Default for DigestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy `src` to `dst`, computing the digest of the bytes in transit, then
/// mirror the source's access and modification timestamps onto `dst`.
pub fn copy_with_digest(src: &Path, dst: &Path) -> Result<Digest> {
    let mut from = File::open(src)?;
    let mut to = File::create(dst)?;
    let mut builder = DigestBuilder::new();
    let mut buffer = [0u8; 8192];
    loop {
        let n = from.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        to.write_all(&buffer[..n])?;
        builder.update(&buffer[..n]);
    }
    to.sync_all()?;
    drop(to);
    let meta = src.metadata()?;
    filetime::set_file_times(
        dst,
        filetime::FileTime::from_last_access_time(&meta),
        filetime::FileTime::from_last_modification_time(&meta),
    )?;
    Ok(builder.finalize())
}

/// Map from relative path to file digest, kept in case-insensitive DOS
/// order. The ordering is wire-visible (it feeds `tds_digest`), so the
/// table is an explicitly sorted vector rather than a container whose
/// ordering is an implementation detail.
#[derive(Debug, Clone, Default)]
pub struct FileDigestTable {
    entries: Vec<(String, Digest)>,
}

impl FileDigestTable {
    pub fn new() -> Self {
        FileDigestTable { entries: Vec::new() }
    }

    /// Insert an entry, replacing any existing entry for the same path.
    pub fn insert(&mut self, path: impl Into<String>, digest: Digest) {
        let path = path.into();
        match self
            .entries
            .binary_search_by(|(p, _)| dospath::dos_cmp(p, &path))
        {
            Ok(idx) => self.entries[idx] = (path, digest),
            Err(idx) => self.entries.insert(idx, (path, digest)),
        }
    }

    pub fn get(&self, path: &str) -> Option<&Digest> {
        self.entries
            .binary_search_by(|(p, _)| dospath::dos_cmp(p, path))
            .ok()
            .map(|idx| &self.entries[idx].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Digest)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The composite package digest: for each entry in DOS order, feed the
/// DOS-normalized path bytes and the 16 digest bytes into one hash.
pub fn tds_digest(files: &FileDigestTable) -> Digest {
    let mut builder = DigestBuilder::new();
    for (path, digest) in files.iter() {
        let dos = dospath::to_dos(path);
        builder.update(dos.as_bytes());
        builder.update(digest.as_bytes());
    }
    builder.finalize()
}
