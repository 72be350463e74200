// src/options.rs

//! Run configuration shared across the pipeline stages.

use crate::archive::ArchiveFileType;
use crate::package::{PackageInfo, PackageLevel, PackageSpec};
use crate::series::{Series, SUPPORTED_SERIES};
use crate::signing::Signer;
use std::collections::BTreeMap;

/// Everything a pipeline stage needs to know about the current run: the
/// package list, level defaults, series, signing key and the timestamp used
/// for newly packaged archives.
pub struct BuildOptions {
    pub default_level: PackageLevel,
    pub default_archive_file_type: ArchiveFileType,
    pub package_list: BTreeMap<String, PackageSpec>,
    pub series: Series,
    pub release_state: String,
    pub texmf_prefix: String,
    /// Program start time, or the `--time-packaged` override.
    pub time_packaged: i64,
    pub signer: Option<Signer>,
}

impl BuildOptions {
    pub fn new() -> Self {
        BuildOptions {
            default_level: PackageLevel::Total,
            default_archive_file_type: ArchiveFileType::TarLzma,
            package_list: BTreeMap::new(),
            series: SUPPORTED_SERIES,
            release_state: "stable".to_string(),
            texmf_prefix: "texmf".to_string(),
            time_packaged: chrono::Utc::now().timestamp(),
            signer: None,
        }
    }

    /// Level assigned to a package: from the package list when listed,
    /// otherwise the default level.
    pub fn level_of(&self, info: &PackageInfo) -> PackageLevel {
        self.package_list
            .get(&info.id)
            .map(|spec| spec.level)
            .unwrap_or(self.default_level)
    }

    pub fn is_ignored(&self, info: &PackageInfo) -> bool {
        self.level_of(info) == PackageLevel::Ignore
    }

    pub fn signer(&self) -> Option<&Signer> {
        self.signer.as_ref()
    }

    /// Database archives switched from bzip2 to lzma in series 2.7.
    pub fn db_archive_file_type(&self) -> ArchiveFileType {
        if self.series < Series::new(2, 7) {
            ArchiveFileType::TarBzip2
        } else {
            ArchiveFileType::TarLzma
        }
    }

    fn db_file_name(&self, id: u32) -> String {
        format!(
            "miktex-zzdb{}-{}{}",
            id,
            self.series,
            self.db_archive_file_type().extension()
        )
    }

    /// Name of the repository manifest archive (`mpm.ini` inside).
    pub fn repository_manifest_archive_name(&self) -> String {
        self.db_file_name(1)
    }

    /// Name of the package-manifest-directory archive.
    pub fn tpm_archive_name(&self) -> String {
        self.db_file_name(2)
    }

    /// Name of the combined package-manifests archive.
    pub fn package_manifests_archive_name(&self) -> String {
        self.db_file_name(3)
    }

    /// Path of a package's manifest file relative to the TEXMF prefix root,
    /// e.g. `texmf/tpm/packages/foo.tpm`.
    pub fn package_manifest_path(&self, id: &str) -> String {
        format!("{}/tpm/packages/{}.tpm", self.texmf_prefix, id)
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::new()
    }
}
