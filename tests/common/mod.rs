// tests/common/mod.rs

//! Shared test fixtures for integration tests.

use mpc::archive;
use mpc::cfg::Document;
use mpc::{BuildOptions, PackageTable};
use std::fs;
use std::path::{Path, PathBuf};

/// Create a staging directory for one package.
///
/// `ini_extra` is appended verbatim to the generated `package.ini`; `files`
/// are relative paths under `Files/` with their contents.
pub fn stage_package(
    root: &Path,
    id: &str,
    ini_extra: &str,
    files: &[(&str, &str)],
) -> PathBuf {
    let staging = root.join(id);
    fs::create_dir_all(&staging).unwrap();
    fs::write(
        staging.join("package.ini"),
        format!("id={}\nname={}\n{}", id, id, ini_extra),
    )
    .unwrap();
    for (rel, content) in files {
        let path = staging.join("Files").join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    staging
}

/// Seed a repository with an empty manifest archive so that an update run
/// can load previous state.
pub fn seed_empty_repository(repository: &Path, options: &BuildOptions) {
    fs::create_dir_all(repository).unwrap();
    let work = tempfile::tempdir().unwrap();
    Document::new().write(&work.path().join("mpm.ini"), None).unwrap();
    archive::create_archive(
        work.path(),
        "mpm.ini",
        &repository.join(options.repository_manifest_archive_name()),
        options.db_archive_file_type(),
    )
    .unwrap();
}

/// Collect all packages below one staging root.
pub fn collect(root: &Path, options: &BuildOptions) -> PackageTable {
    let mut table = PackageTable::new();
    mpc::staging::collect_packages(root, &mut table, options).unwrap();
    table
}

/// Extract `mpm.ini` from the repository manifest archive.
pub fn read_mpm_ini(repository: &Path, options: &BuildOptions) -> Document {
    let out = tempfile::tempdir().unwrap();
    let extracted = out.path().join("mpm.ini");
    archive::extract_single(
        &repository.join(options.repository_manifest_archive_name()),
        options.db_archive_file_type(),
        "mpm.ini",
        &extracted,
    )
    .unwrap();
    Document::read(&extracted).unwrap()
}
