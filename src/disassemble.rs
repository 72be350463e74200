// src/disassemble.rs

//! Package disassembly
//!
//! Inverse of the staging reader: given a live package manifest and the TeX
//! directory tree it describes, reconstruct a staging directory with
//! `package.ini`, `md5sums.txt`, `Description`, the copied `Files/` subtree
//! and a fresh package manifest.

use crate::cfg::Document;
use crate::digest::{self, copy_with_digest, Digest, FileDigestTable};
use crate::dospath;
use crate::error::Result;
use crate::options::BuildOptions;
use crate::package::PackageInfo;
use crate::staging;
use crate::tpm;
use std::fs;
use std::path::Path;
use tracing::info;

/// Rebuild a staging directory from `package_manifest_file` and the files
/// under `source_dir`.
pub fn disassemble_package(
    package_manifest_file: &Path,
    source_dir: &Path,
    staging_dir: &Path,
    options: &BuildOptions,
) -> Result<()> {
    info!("Parsing {}...", package_manifest_file.display());
    let (mut info, _) = tpm::read_package_manifest(package_manifest_file)?;

    // the manifest file itself is not part of the staged content
    if let Ok(rel) = package_manifest_file.strip_prefix(source_dir) {
        let rel = rel.to_string_lossy().replace('\\', "/");
        info.run_files.retain(|f| !dospath::dos_eq(f, &rel));
    }

    // the file name is authoritative for the id
    if let Some(stem) = package_manifest_file.file_stem().and_then(|s| s.to_str()) {
        info.id = stem.to_string();
    }

    info!(" {} ({} files)...", info.id, info.num_files());

    // copy files into the staging tree, collecting digests
    let files_dir = staging_dir.join("Files");
    let mut digests = FileDigestTable::new();
    for rel in info
        .run_files
        .iter()
        .chain(info.doc_files.iter())
        .chain(info.source_files.iter())
    {
        let src = source_dir.join(rel);
        let dst = files_dir.join(rel);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        let file_digest = copy_with_digest(&src, &dst)?;
        if rel.to_ascii_lowercase().ends_with(".tpm") {
            continue;
        }
        digests.insert(rel.clone(), file_digest);
    }

    let tds_digest = digest::tds_digest(&digests);

    initialize_staging_directory(staging_dir, &info, &digests, tds_digest)?;

    // recollect from the staging tree and write a fresh manifest
    info.digest = Some(tds_digest);
    info.path = staging_dir.to_path_buf();
    staging::collect_package(&mut info, &options.texmf_prefix)?;

    let manifest_dir = files_dir.join(&options.texmf_prefix).join("tpm/packages");
    fs::create_dir_all(&manifest_dir)?;
    tpm::write_package_manifest(
        &manifest_dir.join(format!("{}.tpm", info.id)),
        &info,
        Some(0),
    )?;

    Ok(())
}

/// Write `package.ini`, `md5sums.txt` and `Description` into a staging
/// directory.
fn initialize_staging_directory(
    staging_dir: &Path,
    info: &PackageInfo,
    digests: &FileDigestTable,
    tds_digest: Digest,
) -> Result<()> {
    fs::create_dir_all(staging_dir)?;

    let mut ini = Document::new();
    ini.put("", "id", &info.id);
    ini.put("", "name", &info.display_name);
    ini.put("", "creator", &info.creator);
    ini.put("", "title", &info.title);
    ini.put("", "version", &info.version);
    ini.put("", "targetsystem", &info.target_system);
    ini.put("", "min_target_system_version", &info.min_target_system_version);
    ini.put("", "md5", tds_digest.to_string());
    ini.put("", "ctan_path", &info.ctan_path);
    ini.put("", "copyright_owner", &info.copyright_owner);
    ini.put("", "copyright_year", &info.copyright_year);
    ini.put("", "license_type", &info.license_type);
    for dep in &info.required_packages {
        ini.append("", "requires", dep);
    }
    // accepted by older readers that predate the id key
    ini.put("", "externalname", &info.id);
    ini.write(&staging_dir.join("package.ini"), None)?;

    let mut md5sums = String::new();
    for (path, file_digest) in digests.iter() {
        md5sums.push_str(&format!("{} {}\n", file_digest, dospath::to_unix(path)));
    }
    fs::write(staging_dir.join("md5sums.txt"), md5sums)?;

    if !info.description.is_empty() {
        fs::write(staging_dir.join("Description"), &info.description)?;
    }

    Ok(())
}
