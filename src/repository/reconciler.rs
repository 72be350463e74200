// src/repository/reconciler.rs

//! Archive reconciliation
//!
//! For every package that gets an archive, decide between reusing the one
//! already in the repository and rebuilding it. The decision is driven by
//! the TDS digest recorded in the repository manifest; when the manifest
//! disagrees with the archive on disk, the archive's own embedded package
//! manifest gets the final word before a rebuild is forced.

use crate::archive::{self, ArchiveFileType};
use crate::cfg::Document;
use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::options::BuildOptions;
use crate::package::{PackageInfo, PackageTable};
use crate::tpm;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Reconcile every non-ignored, non-container package with the repository
/// and record the outcome in the repository manifest.
pub fn update_repository(
    table: &mut PackageTable,
    repository: &Path,
    manifest: &mut Document,
    options: &BuildOptions,
) -> Result<()> {
    for info in table.values_mut() {
        if options.is_ignored(info) || info.is_pure_container() {
            continue;
        }

        manifest.put(&info.id, "Level", options.level_of(info).to_string());

        let archive_type = create_archive_file(info, repository, manifest, options)?;

        let digest = info
            .digest
            .ok_or_else(|| Error::InvalidManifest(format!("{}: no digest", info.id)))?;
        let time_packaged = info
            .time_packaged
            .ok_or_else(|| Error::InvalidManifest(format!("{}: no packaging time", info.id)))?;

        manifest.put(&info.id, "MD5", digest.to_string());
        manifest.put(&info.id, "TimePackaged", time_packaged.to_string());
        manifest.put(&info.id, "CabSize", info.archive_file_size.to_string());
        if let Some(archive_digest) = &info.archive_file_digest {
            manifest.put(&info.id, "CabMD5", archive_digest.to_string());
        }
        manifest.put(&info.id, "Type", archive_type.type_name());

        for (key, value) in [
            ("Version", &info.version),
            ("TargetSystem", &info.target_system),
            ("MinTargetSystemVersion", &info.min_target_system_version),
        ] {
            if value.is_empty() {
                manifest.delete_value(&info.id, key);
            } else {
                manifest.put(&info.id, key, value);
            }
        }
    }
    Ok(())
}

/// The manifest's recorded digest and packaging time for a package, when
/// both are present and well-formed.
fn recorded_state(manifest: &Document, id: &str) -> Option<(Digest, i64)> {
    let digest = manifest.get(id, "MD5")?.parse().ok()?;
    let time = manifest.get(id, "TimePackaged")?.parse().ok()?;
    Some((digest, time))
}

/// Reuse or rebuild one package archive. On return the package carries its
/// archive size, archive digest and a stable `time_packaged`.
fn create_archive_file(
    info: &mut PackageInfo,
    repository: &Path,
    manifest: &Document,
    options: &BuildOptions,
) -> Result<ArchiveFileType> {
    let digest = info
        .digest
        .ok_or_else(|| Error::InvalidManifest(format!("{}: no digest", info.id)))?;

    let mut reuse = false;
    let mut archive_file = None;
    let mut archive_type = options.default_archive_file_type;

    if let Some((existing_file, existing_type)) = archive::find_package_archive(repository, &info.id)
    {
        match recorded_state(manifest, &info.id) {
            Some((recorded, time)) if recorded == digest => {
                info.time_packaged = Some(time);
                reuse = true;
                archive_file = Some(existing_file);
                archive_type = existing_type;
            }
            _ => {
                // The manifest disagrees; ask the archive itself. Its
                // embedded package manifest records the digest of the
                // content it was built from.
                let temp = tempfile::NamedTempFile::new()?;
                archive::extract_single(
                    &existing_file,
                    existing_type,
                    &options.package_manifest_path(&info.id),
                    temp.path(),
                )?;
                let (embedded, embedded_time) = tpm::read_package_manifest(temp.path())?;
                if embedded.digest == Some(digest) {
                    if let Some(time) = embedded_time {
                        warn!(
                            "{}: repository manifest disagrees with archive; \
                             adopting the archive's packaging time {}",
                            info.id, time
                        );
                        info.time_packaged = Some(time);
                        reuse = true;
                        archive_file = Some(existing_file);
                        archive_type = existing_type;
                    }
                }
            }
        }
    }

    let archive_file = if reuse {
        archive_file.expect("reuse implies an existing archive")
    } else {
        archive_type = options.default_archive_file_type;
        let archive_file = repository.join(format!("{}{}", info.id, archive_type.extension()));
        info!("Creating {}...", archive_file.display());

        fs::create_dir_all(repository)?;

        // keep the time-stamp when only the archive is missing
        info.time_packaged = match recorded_state(manifest, &info.id) {
            Some((recorded, time)) if recorded == digest => Some(time),
            _ => Some(options.time_packaged),
        };

        // a fresh package manifest rides inside the archive
        let manifest_rel = options.package_manifest_path(&info.id);
        let manifest_path = info.path.join("Files").join(&manifest_rel);
        fs::create_dir_all(manifest_path.parent().expect("manifest path has a parent"))?;
        tpm::write_package_manifest(&manifest_path, info, info.time_packaged)?;

        archive::create_archive(
            &info.path.join("Files"),
            &options.texmf_prefix,
            &archive_file,
            archive_type,
        )?;
        archive_file
    };

    info.archive_file_size = archive_file.metadata()?.len();
    info.archive_file_digest = Some(Digest::of_file(&archive_file)?);

    if !reuse {
        if let Some(time) = info.time_packaged {
            filetime::set_file_mtime(&archive_file, filetime::FileTime::from_unix_time(time, 0))?;
        }
    }

    Ok(archive_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging;
    use std::path::PathBuf;

    fn stage(dir: &Path, id: &str, content: &[u8]) -> PathBuf {
        let staging = dir.join(id);
        let file = staging.join("Files/texmf/tex").join(format!("{}.sty", id));
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(file, content).unwrap();
        fs::write(
            staging.join("package.ini"),
            format!("id={}\nname={}\n", id, id),
        )
        .unwrap();
        staging
    }

    fn collected(dir: &Path, id: &str, content: &[u8]) -> PackageInfo {
        let staging = stage(dir, id, content);
        let mut info = staging::read_package_info(&staging).unwrap();
        staging::collect_package(&mut info, "texmf").unwrap();
        info
    }

    #[test]
    fn test_rebuild_then_reuse() {
        let work = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        let mut options = BuildOptions::new();
        options.time_packaged = 1700000000;

        let mut table = PackageTable::new();
        table.insert(collected(work.path(), "foo", b"content"));
        let mut manifest = Document::new();

        update_repository(&mut table, repo.path(), &mut manifest, &options).unwrap();

        let archive = repo.path().join("foo.tar.lzma");
        assert!(archive.is_file());
        let first_digest = Digest::of_file(&archive).unwrap();
        assert_eq!(manifest.get("foo", "TimePackaged"), Some("1700000000"));
        assert_eq!(manifest.get("foo", "Type"), Some("TarLzma"));
        assert_eq!(
            manifest.get("foo", "CabMD5"),
            Some(first_digest.to_string().as_str())
        );
        let mtime =
            filetime::FileTime::from_last_modification_time(&archive.metadata().unwrap());
        assert_eq!(mtime.unix_seconds(), 1700000000);

        // second run with a later start time: archive untouched, time kept
        let mut options2 = BuildOptions::new();
        options2.time_packaged = 1800000000;
        let mut info = staging::read_package_info(&work.path().join("foo")).unwrap();
        staging::collect_package(&mut info, "texmf").unwrap();
        let mut table2 = PackageTable::new();
        table2.insert(info);

        update_repository(&mut table2, repo.path(), &mut manifest, &options2).unwrap();
        assert_eq!(manifest.get("foo", "TimePackaged"), Some("1700000000"));
        assert_eq!(Digest::of_file(&archive).unwrap(), first_digest);
        assert_eq!(table2.get("foo").unwrap().time_packaged, Some(1700000000));
    }

    #[test]
    fn test_content_change_forces_rebuild() {
        let work = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        let mut options = BuildOptions::new();
        options.time_packaged = 1700000000;

        let mut table = PackageTable::new();
        table.insert(collected(work.path(), "foo", b"v1"));
        let mut manifest = Document::new();
        update_repository(&mut table, repo.path(), &mut manifest, &options).unwrap();

        // change the content in place
        fs::write(work.path().join("foo/Files/texmf/tex/foo.sty"), b"v2").unwrap();
        let mut info = staging::read_package_info(&work.path().join("foo")).unwrap();
        staging::collect_package(&mut info, "texmf").unwrap();
        let new_digest = info.digest.unwrap();
        let mut table = PackageTable::new();
        table.insert(info);

        let mut options2 = BuildOptions::new();
        options2.time_packaged = 1800000000;
        update_repository(&mut table, repo.path(), &mut manifest, &options2).unwrap();

        assert_eq!(manifest.get("foo", "MD5"), Some(new_digest.to_string().as_str()));
        assert_eq!(manifest.get("foo", "TimePackaged"), Some("1800000000"));
    }

    #[test]
    fn test_manifest_disagreement_recovers_from_embedded_manifest() {
        let work = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        let mut options = BuildOptions::new();
        options.time_packaged = 1700000000;

        let mut table = PackageTable::new();
        table.insert(collected(work.path(), "foo", b"stable"));
        let mut manifest = Document::new();
        update_repository(&mut table, repo.path(), &mut manifest, &options).unwrap();

        // corrupt the manifest's record; the archive still matches
        manifest.put("foo", "MD5", &Digest::of_bytes(b"wrong").to_string());

        let mut info = staging::read_package_info(&work.path().join("foo")).unwrap();
        staging::collect_package(&mut info, "texmf").unwrap();
        let mut table = PackageTable::new();
        table.insert(info);

        let mut options2 = BuildOptions::new();
        options2.time_packaged = 1900000000;
        update_repository(&mut table, repo.path(), &mut manifest, &options2).unwrap();

        // the embedded manifest restored the original packaging time
        assert_eq!(manifest.get("foo", "TimePackaged"), Some("1700000000"));
    }

    #[test]
    fn test_pure_container_gets_no_archive() {
        let work = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        let options = BuildOptions::new();

        let staging = work.path().join("holder");
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("package.ini"), "id=holder\nname=Holder\n").unwrap();
        let mut info = staging::read_package_info(&staging).unwrap();
        staging::collect_package(&mut info, "texmf").unwrap();
        let mut table = PackageTable::new();
        table.insert(info);

        let mut manifest = Document::new();
        update_repository(&mut table, repo.path(), &mut manifest, &options).unwrap();

        assert!(archive::find_package_archive(repo.path(), "holder").is_none());
        assert!(manifest.section("holder").is_none());
    }

    #[test]
    fn test_version_fields_set_and_deleted() {
        let work = tempfile::tempdir().unwrap();
        let repo = tempfile::tempdir().unwrap();
        let options = BuildOptions::new();

        let staging = stage(work.path(), "foo", b"x");
        fs::write(
            staging.join("package.ini"),
            "id=foo\nname=Foo\nversion=1.0\n",
        )
        .unwrap();
        let mut info = staging::read_package_info(&staging).unwrap();
        staging::collect_package(&mut info, "texmf").unwrap();
        let mut table = PackageTable::new();
        table.insert(info);

        let mut manifest = Document::new();
        manifest.put("foo", "TargetSystem", "stale");
        update_repository(&mut table, repo.path(), &mut manifest, &options).unwrap();

        assert_eq!(manifest.get("foo", "Version"), Some("1.0"));
        assert_eq!(manifest.get("foo", "TargetSystem"), None);
    }
}
