// src/tpm.rs

//! Package manifest files
//!
//! A `.tpm` file is a one-section INI document keyed by the package id; the
//! combined `package-manifests.ini` holds one such section per package.
//! File lists keep their TEXMF-prefixed relative paths, so a manifest
//! round-trips through [`read_package_manifest`] unchanged.

use crate::cfg::Document;
use crate::error::{Error, Result};
use crate::package::{PackageInfo, PackageTable};
use std::path::Path;

/// Add one package's manifest section to a document.
pub fn put_package_manifest(doc: &mut Document, info: &PackageInfo, time_packaged: Option<i64>) {
    let id = info.id.as_str();

    let scalars = [
        ("DisplayName", &info.display_name),
        ("Creator", &info.creator),
        ("Title", &info.title),
        ("Version", &info.version),
        ("TargetSystem", &info.target_system),
        ("MinTargetSystemVersion", &info.min_target_system_version),
        ("CTANPath", &info.ctan_path),
        ("CopyrightOwner", &info.copyright_owner),
        ("CopyrightYear", &info.copyright_year),
        ("LicenseType", &info.license_type),
    ];
    for (key, value) in scalars {
        if !value.is_empty() {
            doc.put(id, key, value);
        }
    }

    for line in info.description.lines() {
        doc.append(id, "Description", line);
    }
    for dep in &info.required_packages {
        doc.append(id, "Requires", dep);
    }
    for file in &info.run_files {
        doc.append(id, "RunFiles", file);
    }
    for file in &info.doc_files {
        doc.append(id, "DocFiles", file);
    }
    for file in &info.source_files {
        doc.append(id, "SourceFiles", file);
    }

    doc.put(id, "SizeRunFiles", info.size_run_files.to_string());
    doc.put(id, "SizeDocFiles", info.size_doc_files.to_string());
    doc.put(id, "SizeSourceFiles", info.size_source_files.to_string());

    if let Some(digest) = &info.digest {
        doc.put(id, "MD5", digest.to_string());
    }
    if let Some(time) = time_packaged {
        doc.put(id, "TimePackaged", time.to_string());
    }
}

/// Write a single package's `.tpm` file.
pub fn write_package_manifest(
    path: &Path,
    info: &PackageInfo,
    time_packaged: Option<i64>,
) -> Result<()> {
    let mut doc = Document::new();
    put_package_manifest(&mut doc, info, time_packaged);
    doc.write(path, None)
}

/// Read a `.tpm` file back into a [`PackageInfo`] and its recorded
/// packaging time. The id comes from the section name; callers that trust
/// the file name over the content overwrite it.
pub fn read_package_manifest(path: &Path) -> Result<(PackageInfo, Option<i64>)> {
    let doc = Document::read(path)?;
    let section = doc
        .sections()
        .find(|s| !s.name().is_empty())
        .ok_or_else(|| Error::InvalidManifest(format!("{}: no package section", path.display())))?;
    let id = section.name().to_string();

    let field = |key: &str| doc.get(&id, key).unwrap_or("").to_string();

    let mut info = PackageInfo {
        display_name: field("DisplayName"),
        creator: field("Creator"),
        title: field("Title"),
        version: field("Version"),
        target_system: field("TargetSystem"),
        min_target_system_version: field("MinTargetSystemVersion"),
        ctan_path: field("CTANPath"),
        copyright_owner: field("CopyrightOwner"),
        copyright_year: field("CopyrightYear"),
        license_type: field("LicenseType"),
        description: doc.get_all(&id, "Description").join("\n"),
        required_packages: doc.get_all(&id, "Requires").to_vec(),
        run_files: doc.get_all(&id, "RunFiles").to_vec(),
        doc_files: doc.get_all(&id, "DocFiles").to_vec(),
        source_files: doc.get_all(&id, "SourceFiles").to_vec(),
        ..PackageInfo::default()
    };

    let size = |key: &str| doc.get(&id, key).and_then(|s| s.parse().ok()).unwrap_or(0);
    info.size_run_files = size("SizeRunFiles");
    info.size_doc_files = size("SizeDocFiles");
    info.size_source_files = size("SizeSourceFiles");

    if let Some(hex) = doc.get(&id, "MD5") {
        info.digest = Some(hex.parse()?);
    }
    let time_packaged = doc.get(&id, "TimePackaged").and_then(|s| s.parse().ok());
    info.time_packaged = time_packaged;
    info.id = id;

    Ok((info, time_packaged))
}

/// Dump every non-ignored package's manifest into one document. The
/// packaging time of each section comes from the repository manifest.
pub fn dump_package_manifests(
    table: &PackageTable,
    repository_manifest: &Document,
    is_ignored: impl Fn(&PackageInfo) -> bool,
) -> Document {
    let mut doc = Document::new();
    for info in table.values() {
        if is_ignored(info) {
            continue;
        }
        let time_packaged = repository_manifest
            .get(&info.id, "TimePackaged")
            .and_then(|s| s.parse().ok());
        put_package_manifest(&mut doc, info, time_packaged);
    }
    doc
}
