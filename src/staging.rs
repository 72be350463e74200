// src/staging.rs

//! Staging directory reader
//!
//! A staging directory is a self-contained description of one package: a
//! flat `package.ini`, an optional free-text `Description`, and a `Files/`
//! subtree rooted at the TEXMF prefix. Reading one produces a
//! [`PackageInfo`] with classified file lists and, when `package.ini` does
//! not record a digest, a freshly computed TDS digest.

use crate::cfg::Document;
use crate::digest::{self, Digest, FileDigestTable};
use crate::dospath;
use crate::error::{Error, Result};
use crate::options::BuildOptions;
use crate::package::{PackageInfo, PackageTable};
use std::fs;
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

fn io_error(e: walkdir::Error) -> Error {
    Error::Io(e.into())
}

/// Parse `package.ini` and `Description` from a staging directory.
///
/// `id` (or the legacy `externalname`) and `name` are mandatory; everything
/// else is optional. The file lists are left empty; call
/// [`collect_package`] to fill them.
pub fn read_package_info(staging_dir: &Path) -> Result<PackageInfo> {
    let ini = Document::read(&staging_dir.join("package.ini"))?;

    let id = ini
        .get("", "id")
        .or_else(|| ini.get("", "externalname"))
        .ok_or_else(|| Error::InvalidManifest("id".to_string()))?
        .to_string();
    let display_name = ini
        .get("", "name")
        .ok_or_else(|| Error::InvalidManifest("name".to_string()))?
        .to_string();

    let field = |key: &str| ini.get("", key).unwrap_or("").to_string();

    let mut info = PackageInfo {
        id,
        display_name,
        creator: field("creator"),
        title: field("title"),
        version: field("version"),
        target_system: field("targetsystem"),
        min_target_system_version: field("min_target_system_version"),
        ctan_path: field("ctan_path"),
        copyright_owner: field("copyright_owner"),
        copyright_year: field("copyright_year"),
        license_type: field("license_type"),
        required_packages: ini
            .get_all("", "requires")
            .iter()
            .flat_map(|v| v.split(':'))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        path: staging_dir.to_path_buf(),
        ..PackageInfo::default()
    };

    if let Some(hex) = ini.get("", "md5") {
        info.digest = Some(hex.parse()?);
    }

    info.description = read_description(staging_dir)?;

    Ok(info)
}

/// Contents of the optional `Description` file; empty when missing.
pub fn read_description(staging_dir: &Path) -> Result<String> {
    let path = staging_dir.join("Description");
    if !path.is_file() {
        return Ok(String::new());
    }
    Ok(fs::read_to_string(path)?)
}

/// Walk the staging directory's `Files/` subtree and classify every regular
/// file into the run/doc/source lists, accumulating byte sizes. When the
/// package carries no recorded digest, the TDS digest is computed from the
/// collected files.
pub fn collect_package(info: &mut PackageInfo, texmf_prefix: &str) -> Result<()> {
    info.run_files.clear();
    info.doc_files.clear();
    info.source_files.clear();
    info.size_run_files = 0;
    info.size_doc_files = 0;
    info.size_source_files = 0;

    let files_dir = info.path.join("Files");
    if files_dir.is_dir() {
        for entry in WalkDir::new(&files_dir).sort_by_file_name() {
            let entry = entry.map_err(io_error)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&files_dir)
                .expect("walk stays under Files/")
                .to_string_lossy()
                .replace('\\', "/");
            let size = entry.metadata().map_err(io_error)?.len();
            if dospath::starts_with_texmf(&rel, texmf_prefix, "doc") {
                info.doc_files.push(rel);
                info.size_doc_files += size;
            } else if dospath::starts_with_texmf(&rel, texmf_prefix, "source") {
                info.source_files.push(rel);
                info.size_source_files += size;
            } else {
                info.run_files.push(rel);
                info.size_run_files += size;
            }
        }
    }

    if info.digest.is_none() {
        info.digest = Some(compute_tds_digest(info)?);
    }

    Ok(())
}

/// TDS digest over the package's current file lists, hashing each staged
/// file. Package manifest files do not contribute.
pub fn compute_tds_digest(info: &PackageInfo) -> Result<Digest> {
    let files_dir = info.path.join("Files");
    let mut table = FileDigestTable::new();
    for rel in info
        .run_files
        .iter()
        .chain(info.doc_files.iter())
        .chain(info.source_files.iter())
    {
        if rel.to_ascii_lowercase().ends_with(".tpm") {
            continue;
        }
        let digest = Digest::of_file(&files_dir.join(rel))?;
        table.insert(rel.clone(), digest);
    }
    Ok(digest::tds_digest(&table))
}

/// Scan one staging root for staging directories and add each package to
/// the table. Directories without a `package.ini` are skipped; ignored
/// packages are dropped here so they never reach a derived artifact;
/// duplicate ids warn and keep the first occurrence.
pub fn collect_packages(
    staging_root: &Path,
    table: &mut PackageTable,
    options: &BuildOptions,
) -> Result<()> {
    if !staging_root.is_dir() {
        return Ok(());
    }
    let mut entries: Vec<_> = fs::read_dir(staging_root)?
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .filter(|e| e.path().is_dir())
        .collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let staging_dir = entry.path();
        if !staging_dir.join("package.ini").is_file() {
            continue;
        }

        let mut info = read_package_info(&staging_dir)?;

        if options.is_ignored(&info) {
            continue;
        }

        info!("Collecting {}...", info.id);

        if table.contains(&info.id) {
            warn!("{} already collected.", info.id);
            continue;
        }

        collect_package(&mut info, &options.texmf_prefix)?;
        table.insert(info);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::DigestBuilder;
    use std::path::PathBuf;

    fn stage(dir: &Path, id: &str, files: &[(&str, &[u8])]) -> PathBuf {
        let staging = dir.join(id);
        fs::create_dir_all(&staging).unwrap();
        fs::write(
            staging.join("package.ini"),
            format!("id={}\nname={}\n", id, id),
        )
        .unwrap();
        for (rel, content) in files {
            let path = staging.join("Files").join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        staging
    }

    #[test]
    fn test_single_run_file() {
        let dir = tempfile::tempdir().unwrap();
        let staging = stage(dir.path(), "foo", &[("texmf/tex/x.sty", b"hello\n\n\n\n\n")]);

        let mut info = read_package_info(&staging).unwrap();
        collect_package(&mut info, "texmf").unwrap();

        assert_eq!(info.run_files, vec!["texmf/tex/x.sty"]);
        assert!(info.doc_files.is_empty());
        assert!(info.source_files.is_empty());
        assert_eq!(info.size_run_files, 10);
        assert_eq!(info.size_doc_files, 0);
        assert_eq!(info.size_source_files, 0);

        // digest must equal the hash of the single (dos-path, digest) pair
        let mut expected = DigestBuilder::new();
        expected.update(b"texmf\\tex\\x.sty");
        expected.update(Digest::of_bytes(b"hello\n\n\n\n\n").as_bytes());
        assert_eq!(info.digest.unwrap(), expected.finalize());
    }

    #[test]
    fn test_classification_partition() {
        let dir = tempfile::tempdir().unwrap();
        let staging = stage(
            dir.path(),
            "foo",
            &[
                ("texmf/tex/x.sty", b"run"),
                ("texmf/doc/x.pdf", b"doc!"),
                ("texmf/source/x.dtx", b"src.."),
            ],
        );

        let mut info = read_package_info(&staging).unwrap();
        collect_package(&mut info, "texmf").unwrap();

        assert_eq!(info.run_files, vec!["texmf/tex/x.sty"]);
        assert_eq!(info.doc_files, vec!["texmf/doc/x.pdf"]);
        assert_eq!(info.source_files, vec!["texmf/source/x.dtx"]);
        assert_eq!(
            (info.size_run_files, info.size_doc_files, info.size_source_files),
            (3, 4, 5)
        );
    }

    #[test]
    fn test_recorded_digest_wins() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("foo");
        fs::create_dir_all(&staging).unwrap();
        fs::write(
            staging.join("package.ini"),
            "id=foo\nname=Foo\nmd5=d41d8cd98f00b204e9800998ecf8427e\n",
        )
        .unwrap();
        let mut info = read_package_info(&staging).unwrap();
        collect_package(&mut info, "texmf").unwrap();
        assert_eq!(info.digest.unwrap(), Digest::empty());
    }

    #[test]
    fn test_legacy_externalname_and_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("legacy");
        fs::create_dir_all(&staging).unwrap();

        fs::write(staging.join("package.ini"), "externalname=foo\nname=Foo\n").unwrap();
        assert_eq!(read_package_info(&staging).unwrap().id, "foo");

        fs::write(staging.join("package.ini"), "name=Foo\n").unwrap();
        assert!(matches!(
            read_package_info(&staging),
            Err(Error::InvalidManifest(_))
        ));

        fs::write(staging.join("package.ini"), "id=foo\n").unwrap();
        assert!(matches!(
            read_package_info(&staging),
            Err(Error::InvalidManifest(_))
        ));
    }

    #[test]
    fn test_requires_and_description() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("dep");
        fs::create_dir_all(&staging).unwrap();
        fs::write(
            staging.join("package.ini"),
            "id=dep\nname=Dep\nrequires;=bar\nrequires;=baz\n",
        )
        .unwrap();
        fs::write(staging.join("Description"), "A package.\n").unwrap();

        let info = read_package_info(&staging).unwrap();
        assert_eq!(info.required_packages, vec!["bar", "baz"]);
        assert_eq!(info.description, "A package.\n");
    }

    #[test]
    fn test_collect_packages_skips_duplicates_and_ignored() {
        let root1 = tempfile::tempdir().unwrap();
        let root2 = tempfile::tempdir().unwrap();
        stage(root1.path(), "foo", &[("texmf/tex/a.sty", b"a")]);
        stage(root2.path(), "foo", &[("texmf/tex/b.sty", b"b")]);
        stage(root1.path(), "bar", &[("texmf/tex/c.sty", b"c")]);

        let mut options = BuildOptions::new();
        options.package_list.insert(
            "bar".to_string(),
            crate::package::PackageSpec {
                id: "bar".to_string(),
                level: crate::package::PackageLevel::Ignore,
                archive_file_type: crate::archive::ArchiveFileType::TarLzma,
            },
        );

        let mut table = PackageTable::new();
        collect_packages(root1.path(), &mut table, &options).unwrap();
        collect_packages(root2.path(), &mut table, &options).unwrap();

        assert_eq!(table.len(), 1);
        // first occurrence wins
        assert_eq!(table.get("foo").unwrap().run_files, vec!["texmf/tex/a.sty"]);
        assert!(!table.contains("bar"));
    }
}
