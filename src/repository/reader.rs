// src/repository/reader.rs

//! Previous repository state
//!
//! The repository manifest (`mpm.ini`) travels inside the zzdb1 archive;
//! the per-package manifests travel as a `texmf/tpm/packages/` tree inside
//! the zzdb2 archive. Both are extracted into scoped temporaries and parsed
//! back into memory.

use crate::archive;
use crate::cfg::Document;
use crate::error::{Error, Result};
use crate::options::BuildOptions;
use crate::package::PackageTable;
use crate::tpm;
use std::fs;
use std::path::Path;
use tracing::info;

/// Load `mpm.ini` from the repository manifest archive.
pub fn load_repository_manifest(repository: &Path, options: &BuildOptions) -> Result<Document> {
    let archive_file = repository.join(options.repository_manifest_archive_name());
    if !archive_file.is_file() {
        return Err(Error::config(
            "The repository manifest archive file does not exist.",
        ));
    }
    let temp = tempfile::NamedTempFile::new()?;
    archive::extract_single(
        &archive_file,
        options.db_archive_file_type(),
        "mpm.ini",
        temp.path(),
    )?;
    Document::read(temp.path())
}

/// Load every package manifest from the zzdb2 archive into a table.
pub fn load_package_manifests(repository: &Path, options: &BuildOptions) -> Result<PackageTable> {
    let archive_file = repository.join(options.tpm_archive_name());
    if !archive_file.is_file() {
        return Err(Error::config("The TPM archive file does not exist."));
    }

    let temp_dir = tempfile::tempdir()?;
    archive::extract_all(&archive_file, options.db_archive_file_type(), temp_dir.path())?;

    let manifest_dir = temp_dir
        .path()
        .join(&options.texmf_prefix)
        .join("tpm/packages");

    let mut table = PackageTable::new();
    if !manifest_dir.is_dir() {
        return Ok(table);
    }
    let mut entries: Vec<_> = fs::read_dir(&manifest_dir)?
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .filter(|e| {
            e.path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("tpm"))
        })
        .collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let (mut info, _) = tpm::read_package_manifest(&path)?;
        // the file name is authoritative for the id
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            info.id = stem.to_string();
        }
        table.insert(info);
    }

    info!("loaded {} package manifests", table.len());
    Ok(table)
}
