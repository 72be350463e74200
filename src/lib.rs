// src/lib.rs

//! MiKTeX Package Creator
//!
//! Builds a package repository for a TeX distribution out of staging
//! directories: per-package compressed archives, the repository manifest,
//! the package-manifest bundle, a flat file-to-package index and a signed
//! repository information file.
//!
//! # Architecture
//!
//! - Content-addressed: a package's identity is its TDS digest, the hash of
//!   its sorted `(dos-path, file-digest)` pairs
//! - Incremental: archives are reused when the digest recorded in the
//!   repository manifest still matches
//! - Single writer: the on-disk repository directory is the only mutable
//!   resource, and the four database artifacts are published in a fixed
//!   order with `pr.ini` last

pub mod archive;
pub mod cfg;
pub mod digest;
pub mod disassemble;
pub mod dospath;
mod error;
pub mod list;
pub mod options;
pub mod package;
pub mod repository;
pub mod series;
pub mod signing;
pub mod staging;
pub mod tds;
pub mod tpm;

pub use archive::ArchiveFileType;
pub use digest::{Digest, FileDigestTable};
pub use error::{Error, Result};
pub use options::BuildOptions;
pub use package::{PackageInfo, PackageLevel, PackageSpec, PackageTable};
pub use series::{Series, SUPPORTED_SERIES};
pub use signing::{KeyFileProvider, PrivateKeyProvider, Signer};
