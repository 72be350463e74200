// src/tds.rs

//! TDS assembly
//!
//! The alternate terminal stage: instead of producing archives, materialize
//! every package's files into one TeX directory tree, verifying each
//! package's TDS digest on the way, and record the packages in a repository
//! manifest written as `mpm.ini` under the tree.

use crate::cfg::Document;
use crate::digest::{self, copy_with_digest, FileDigestTable};
use crate::error::{Error, Result};
use crate::options::BuildOptions;
use crate::package::{PackageInfo, PackageTable};
use crate::tpm;
use std::fs;
use std::path::Path;
use tracing::info;

/// Copy every non-ignored package into `texmf_parent` and fill the
/// repository manifest.
pub fn build_tds(
    table: &PackageTable,
    texmf_parent: &Path,
    manifest: &mut Document,
    options: &BuildOptions,
) -> Result<()> {
    for info in table.values() {
        if options.is_ignored(info) {
            continue;
        }
        copy_package(info, texmf_parent, options)?;

        manifest.put(&info.id, "Level", options.level_of(info).to_string());
        let tds = info
            .digest
            .ok_or_else(|| Error::InvalidManifest(format!("{}: no digest", info.id)))?;
        manifest.put(&info.id, "MD5", tds.to_string());
        manifest.put(&info.id, "TimePackaged", options.time_packaged.to_string());
        for (key, value) in [
            ("Version", &info.version),
            ("TargetSystem", &info.target_system),
            ("MinTargetSystemVersion", &info.min_target_system_version),
        ] {
            if !value.is_empty() {
                manifest.put(&info.id, key, value);
            }
        }
    }
    Ok(())
}

/// Copy one package's files into the destination tree, capturing digests,
/// and verify the result against the recorded TDS digest.
fn copy_package(info: &PackageInfo, dest_dir: &Path, options: &BuildOptions) -> Result<()> {
    info!("Copying {}...", info.id);

    let manifest_dir = dest_dir.join(&options.texmf_prefix).join("tpm/packages");
    fs::create_dir_all(&manifest_dir)?;
    tpm::write_package_manifest(
        &manifest_dir.join(format!("{}.tpm", info.id)),
        info,
        Some(options.time_packaged),
    )?;

    let source_root = info.path.join("Files");
    let mut digests = FileDigestTable::new();
    for rel in info
        .run_files
        .iter()
        .chain(info.doc_files.iter())
        .chain(info.source_files.iter())
    {
        let src = source_root.join(rel);
        let dst = dest_dir.join(rel);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        let file_digest = copy_with_digest(&src, &dst)?;
        // package manifest files do not contribute to the TDS digest
        if rel.to_ascii_lowercase().ends_with(".tpm") {
            continue;
        }
        digests.insert(rel.clone(), file_digest);
    }

    if Some(digest::tds_digest(&digests)) != info.digest {
        return Err(Error::DigestMismatch {
            id: info.id.clone(),
        });
    }
    Ok(())
}

/// Write the repository manifest as `mpm.ini` under the TDS tree.
pub fn write_mpm_ini(
    texmf_parent: &Path,
    manifest: &Document,
    options: &BuildOptions,
) -> Result<()> {
    let path = texmf_parent
        .join(&options.texmf_prefix)
        .join("miktex/config/mpm.ini");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    manifest.write(&path, options.signer())
}

/// Dump one `.tpm` per non-ignored package into `dest_dir`, carrying each
/// package's `TimePackaged` from the repository manifest.
pub fn write_package_manifest_files(
    table: &PackageTable,
    dest_dir: &Path,
    manifest: &Document,
    options: &BuildOptions,
) -> Result<()> {
    fs::create_dir_all(dest_dir)?;
    info!("writing package manifest files in {}...", dest_dir.display());
    for info in table.values() {
        if options.is_ignored(info) {
            continue;
        }
        let time_packaged = manifest
            .get(&info.id, "TimePackaged")
            .and_then(|s| s.parse().ok());
        let path = dest_dir.join(format!("{}.tpm", info.id));
        if path.exists() {
            fs::remove_file(&path)?;
        }
        tpm::write_package_manifest(&path, info, time_packaged)?;
    }
    Ok(())
}
