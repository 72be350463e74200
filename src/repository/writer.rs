// src/repository/writer.rs

//! Database publication
//!
//! Emits the four derived artifacts into the repository directory, in
//! order: the repository-manifest archive (zzdb1), the package-manifest
//! tree archive (zzdb2), the combined package-manifests archive (zzdb3),
//! the `files.csv.lzma` flat index, and finally `pr.ini`, written twice
//! because the first write itself changes the directory listing that
//! `lstdigest` covers.

use crate::archive::{self, ArchiveFileType};
use crate::cfg::Document;
use crate::digest::{Digest, DigestBuilder};
use crate::error::Result;
use crate::options::BuildOptions;
use crate::package::PackageTable;
use crate::tpm;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Local epoch for the repository `version` day counter
/// (2000-01-01 00:00:00).
const T2000: i64 = 946681200;

/// Fixed-name temporary path whose destructor always attempts removal.
struct ScopedPath(PathBuf);

impl ScopedPath {
    fn new(path: PathBuf) -> Self {
        ScopedPath(path)
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for ScopedPath {
    fn drop(&mut self) {
        if self.0.is_dir() {
            let _ = fs::remove_dir_all(&self.0);
        } else {
            let _ = fs::remove_file(&self.0);
        }
    }
}

/// Write the complete database into the repository. With `prune`, manifest
/// sections for packages no longer in the table (or now ignored) are
/// dropped first.
pub fn write_database(
    table: &PackageTable,
    repository: &Path,
    prune: bool,
    manifest: &mut Document,
    options: &BuildOptions,
) -> Result<()> {
    fs::create_dir_all(repository)?;

    if prune {
        let obsolete: Vec<String> = manifest
            .sections()
            .map(|s| s.name().to_string())
            .filter(|id| match table.get(id) {
                Some(info) => options.is_ignored(info),
                None => true,
            })
            .collect();
        for id in obsolete {
            debug!("pruning manifest section {}", id);
            manifest.delete_section(&id);
        }
    }

    let db_type = options.db_archive_file_type();

    // zzdb1: the repository manifest
    {
        let mpm = ScopedPath::new(repository.join("mpm.ini"));
        manifest.write(mpm.path(), options.signer())?;
        archive::create_archive(
            repository,
            "mpm.ini",
            &repository.join(options.repository_manifest_archive_name()),
            db_type,
        )?;
    }

    // zzdb2: one manifest file per package
    {
        let tree = ScopedPath::new(repository.join(&options.texmf_prefix));
        let manifest_dir = tree.path().join("tpm/packages");
        fs::create_dir_all(&manifest_dir)?;
        info!("writing package manifest files in {}...", manifest_dir.display());
        for info in table.values() {
            if options.is_ignored(info) {
                continue;
            }
            let time_packaged = manifest
                .get(&info.id, "TimePackaged")
                .and_then(|s| s.parse().ok());
            tpm::write_package_manifest(
                &manifest_dir.join(format!("{}.tpm", info.id)),
                info,
                time_packaged,
            )?;
        }
        archive::create_archive(
            repository,
            &options.texmf_prefix,
            &repository.join(options.tpm_archive_name()),
            db_type,
        )?;
    }

    // zzdb3: all manifests in one document
    {
        let ini = ScopedPath::new(repository.join("package-manifests.ini"));
        let dump = tpm::dump_package_manifests(table, manifest, |p| options.is_ignored(p));
        dump.write(ini.path(), options.signer())?;
        archive::create_archive(
            repository,
            "package-manifests.ini",
            &repository.join(options.package_manifests_archive_name()),
            db_type,
        )?;
    }

    create_file_list(table, repository, options)?;

    clean_up(repository)?;

    create_repository_information_file(table, repository, manifest, options)?;

    Ok(())
}

/// Emit the sorted `files.csv` flat index and compress it to
/// `files.csv.lzma`; the uncompressed file does not stay behind.
fn create_file_list(
    table: &PackageTable,
    repository: &Path,
    options: &BuildOptions,
) -> Result<()> {
    let prefix = format!("{}/", options.texmf_prefix);
    let mut lines: Vec<String> = Vec::new();
    for info in table.values() {
        if options.is_ignored(info) {
            continue;
        }
        for file in info
            .doc_files
            .iter()
            .chain(info.run_files.iter())
            .chain(info.source_files.iter())
        {
            let rel = file.strip_prefix(&prefix).unwrap_or(file);
            lines.push(format!("{};{}", rel, info.id));
        }
    }
    lines.sort();

    let csv = ScopedPath::new(repository.join("files.csv"));
    let mut text = String::new();
    for line in &lines {
        text.push_str(line);
        text.push('\n');
    }
    fs::write(csv.path(), text)?;
    archive::compress_file(
        csv.path(),
        ArchiveFileType::TarLzma,
        &repository.join("files.csv.lzma"),
    )?;
    Ok(())
}

/// Delete archives superseded by a newer format: a `.cab` once the same
/// stem has a `.tar.bz2` or `.tar.lzma`, a `.tar.bz2` once it has a
/// `.tar.lzma`.
fn clean_up(repository: &Path) -> Result<()> {
    let mut to_delete: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(repository)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(stem) = name.strip_suffix(".cab") {
            if repository.join(format!("{}.tar.bz2", stem)).is_file()
                || repository.join(format!("{}.tar.lzma", stem)).is_file()
            {
                to_delete.push(entry.path());
            }
        } else if let Some(stem) = name.strip_suffix(".tar.bz2") {
            if repository.join(format!("{}.tar.lzma", stem)).is_file() {
                to_delete.push(entry.path());
            }
        }
    }
    for path in to_delete {
        info!("Removing {}...", path.display());
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Digest of the sorted `<name>;<size>` listing of the repository
/// directory.
fn listing_digest(repository: &Path) -> Result<Digest> {
    let mut lines: Vec<String> = Vec::new();
    for entry in fs::read_dir(repository)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        lines.push(format!(
            "{};{}\n",
            entry.file_name().to_string_lossy(),
            meta.len()
        ));
    }
    lines.sort();
    let mut builder = DigestBuilder::new();
    for line in &lines {
        builder.update(line.as_bytes());
    }
    Ok(builder.finalize())
}

/// Write `pr.ini`. The first write carries a placeholder `lstdigest`; the
/// second carries the digest of the directory listing that now includes
/// `pr.ini` itself. Both writes produce the same file size, so the second
/// write does not invalidate the digest it records.
fn create_repository_information_file(
    table: &PackageTable,
    repository: &Path,
    manifest: &Document,
    options: &BuildOptions,
) -> Result<()> {
    let mut recent: Vec<(i64, &str)> = table
        .values()
        .map(|info| {
            let time = manifest
                .get(&info.id, "TimePackaged")
                .and_then(|s| s.parse().ok())
                .unwrap_or(-1);
            (time, info.id.as_str())
        })
        .collect();
    recent.sort_by_key(|(time, _)| std::cmp::Reverse(*time));
    let lastupd = recent
        .iter()
        .take(20)
        .map(|(_, id)| *id)
        .collect::<Vec<_>>()
        .join(" ");

    let days = (options.time_packaged - T2000) / (60 * 60 * 24);

    let mut doc = Document::new();
    doc.put("repository", "date", options.time_packaged.to_string());
    doc.put("repository", "version", days.to_string());
    doc.put("repository", "lstdigest", Digest::empty().to_string());
    doc.put("repository", "numpkg", manifest.len().to_string());
    doc.put("repository", "lastupd", lastupd);
    doc.put("repository", "relstate", &options.release_state);

    let path = repository.join("pr.ini");
    if path.exists() {
        fs::remove_file(&path)?;
    }
    doc.write(&path, options.signer())?;

    doc.put(
        "repository",
        "lstdigest",
        listing_digest(repository)?.to_string(),
    );
    doc.write(&path, options.signer())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageInfo;

    fn package(id: &str, time: Option<&str>, manifest: &mut Document) -> PackageInfo {
        if let Some(time) = time {
            manifest.put(id, "Level", "T");
            manifest.put(id, "TimePackaged", time);
        }
        PackageInfo {
            id: id.to_string(),
            display_name: id.to_string(),
            run_files: vec![format!("texmf/tex/{}.sty", id)],
            doc_files: vec![format!("texmf/doc/{}.pdf", id)],
            digest: Some(Digest::of_bytes(id.as_bytes())),
            ..PackageInfo::default()
        }
    }

    fn read_pr_ini(repository: &Path) -> Document {
        Document::read(&repository.join("pr.ini")).unwrap()
    }

    #[test]
    fn test_database_artifacts_are_written() {
        let repo = tempfile::tempdir().unwrap();
        let mut options = BuildOptions::new();
        options.time_packaged = 1700000000;

        let mut manifest = Document::new();
        let mut table = PackageTable::new();
        table.insert(package("foo", Some("1700000000"), &mut manifest));
        table.insert(package("bar", Some("1600000000"), &mut manifest));

        write_database(&table, repo.path(), true, &mut manifest, &options).unwrap();

        for name in [
            options.repository_manifest_archive_name(),
            options.tpm_archive_name(),
            options.package_manifests_archive_name(),
        ] {
            assert!(repo.path().join(&name).is_file(), "missing {}", name);
        }
        assert!(repo.path().join("files.csv.lzma").is_file());
        assert!(!repo.path().join("files.csv").exists());
        assert!(repo.path().join("pr.ini").is_file());
        // scoped temporaries are gone
        assert!(!repo.path().join("mpm.ini").exists());
        assert!(!repo.path().join("package-manifests.ini").exists());
        assert!(!repo.path().join("texmf").exists());
    }

    #[test]
    fn test_zzdb1_round_trips_the_manifest() {
        let repo = tempfile::tempdir().unwrap();
        let options = BuildOptions::new();
        let mut manifest = Document::new();
        let mut table = PackageTable::new();
        table.insert(package("foo", Some("1700000000"), &mut manifest));

        write_database(&table, repo.path(), false, &mut manifest, &options).unwrap();

        let out = tempfile::tempdir().unwrap();
        let extracted = out.path().join("mpm.ini");
        archive::extract_single(
            &repo.path().join(options.repository_manifest_archive_name()),
            options.db_archive_file_type(),
            "mpm.ini",
            &extracted,
        )
        .unwrap();
        let doc = Document::read(&extracted).unwrap();
        assert_eq!(doc.get("foo", "TimePackaged"), Some("1700000000"));
    }

    #[test]
    fn test_prune_drops_stale_sections() {
        let repo = tempfile::tempdir().unwrap();
        let options = BuildOptions::new();
        let mut manifest = Document::new();
        manifest.put("gone", "Level", "T");
        let mut table = PackageTable::new();
        table.insert(package("foo", Some("1700000000"), &mut manifest));

        write_database(&table, repo.path(), true, &mut manifest, &options).unwrap();
        assert!(manifest.section("gone").is_none());
        assert!(manifest.section("foo").is_some());
    }

    #[test]
    fn test_files_csv_is_sorted_and_prefix_stripped() {
        let repo = tempfile::tempdir().unwrap();
        let options = BuildOptions::new();
        let mut manifest = Document::new();
        let mut table = PackageTable::new();
        table.insert(package("zeta", Some("1"), &mut manifest));
        table.insert(package("alpha", Some("2"), &mut manifest));

        write_database(&table, repo.path(), false, &mut manifest, &options).unwrap();

        let out = repo.path().join("files.csv.out");
        archive::decompress_file(
            &repo.path().join("files.csv.lzma"),
            ArchiveFileType::TarLzma,
            &out,
        )
        .unwrap();
        let text = fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(lines, sorted);
        assert!(lines.contains(&"tex/alpha.sty;alpha"));
        assert!(lines.contains(&"doc/zeta.pdf;zeta"));
        assert!(!text.contains("texmf/"));
    }

    #[test]
    fn test_clean_up_superseded_formats() {
        let repo = tempfile::tempdir().unwrap();
        fs::write(repo.path().join("foo.cab"), b"old").unwrap();
        fs::write(repo.path().join("foo.tar.bz2"), b"older").unwrap();
        fs::write(repo.path().join("foo.tar.lzma"), b"new").unwrap();
        fs::write(repo.path().join("bar.cab"), b"only").unwrap();

        clean_up(repo.path()).unwrap();

        assert!(!repo.path().join("foo.cab").exists());
        assert!(!repo.path().join("foo.tar.bz2").exists());
        assert!(repo.path().join("foo.tar.lzma").is_file());
        assert!(repo.path().join("bar.cab").is_file());
    }

    #[test]
    fn test_pr_ini_fields_and_listing_digest() {
        let repo = tempfile::tempdir().unwrap();
        let mut options = BuildOptions::new();
        options.time_packaged = T2000 + 100 * 24 * 60 * 60;
        options.release_state = "next".to_string();

        let mut manifest = Document::new();
        let mut table = PackageTable::new();
        table.insert(package("old", Some("1600000000"), &mut manifest));
        table.insert(package("new", Some("1700000000"), &mut manifest));

        write_database(&table, repo.path(), false, &mut manifest, &options).unwrap();

        let pr = read_pr_ini(repo.path());
        assert_eq!(pr.get("repository", "version"), Some("100"));
        assert_eq!(pr.get("repository", "numpkg"), Some("2"));
        assert_eq!(pr.get("repository", "relstate"), Some("next"));
        assert_eq!(pr.get("repository", "lastupd"), Some("new old"));

        // the recorded digest matches the final directory listing
        let recorded: Digest = pr.get("repository", "lstdigest").unwrap().parse().unwrap();
        assert_eq!(recorded, listing_digest(repo.path()).unwrap());
    }

    #[test]
    fn test_lastupd_caps_at_twenty() {
        let repo = tempfile::tempdir().unwrap();
        let options = BuildOptions::new();
        let mut manifest = Document::new();
        let mut table = PackageTable::new();
        for i in 0..25 {
            table.insert(package(
                &format!("pkg{:02}", i),
                Some(&format!("{}", 1700000000 + i)),
                &mut manifest,
            ));
        }

        write_database(&table, repo.path(), false, &mut manifest, &options).unwrap();

        let pr = read_pr_ini(repo.path());
        let lastupd = pr.get("repository", "lastupd").unwrap();
        let ids: Vec<&str> = lastupd.split(' ').collect();
        assert_eq!(ids.len(), 20);
        assert_eq!(ids[0], "pkg24");
        // non-increasing by TimePackaged
        let times: Vec<i64> = ids
            .iter()
            .map(|id| manifest.get(id, "TimePackaged").unwrap().parse().unwrap())
            .collect();
        assert!(times.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_repeated_write_produces_identical_database_contents() {
        let repo = tempfile::tempdir().unwrap();
        let mut options = BuildOptions::new();
        options.time_packaged = 1700000000;

        let mut manifest = Document::new();
        let mut table = PackageTable::new();
        table.insert(package("foo", Some("1690000000"), &mut manifest));

        write_database(&table, repo.path(), true, &mut manifest, &options).unwrap();
        let first = extract_mpm(repo.path(), &options);
        write_database(&table, repo.path(), true, &mut manifest, &options).unwrap();
        let second = extract_mpm(repo.path(), &options);
        assert_eq!(first, second);
    }

    fn extract_mpm(repository: &Path, options: &BuildOptions) -> Vec<u8> {
        let out = tempfile::tempdir().unwrap();
        let extracted = out.path().join("mpm.ini");
        archive::extract_single(
            &repository.join(options.repository_manifest_archive_name()),
            options.db_archive_file_type(),
            "mpm.ini",
            &extracted,
        )
        .unwrap();
        fs::read(&extracted).unwrap()
    }
}
