// src/package.rs

//! Package data model
//!
//! `PackageInfo` is the central entity of the pipeline: it is created by the
//! staging reader or the repository reader, mutated by the categorizer
//! (`required_by`) and the archive reconciler (`time_packaged`, archive
//! fields), and dropped with the table at the end of the run.
//!
//! Optional string fields use the empty string for "absent", matching the
//! on-disk manifest format where an absent key and an empty value are
//! interchangeable.

use crate::archive::ArchiveFileType;
use crate::digest::Digest;
use std::collections::{btree_map, BTreeMap};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Default)]
pub struct PackageInfo {
    /// Package id, unique within a run under case-insensitive DOS semantics.
    pub id: String,
    /// Human-readable name (mandatory in package.ini).
    pub display_name: String,
    pub creator: String,
    pub title: String,
    pub version: String,
    pub target_system: String,
    pub min_target_system_version: String,
    pub ctan_path: String,
    pub copyright_owner: String,
    pub copyright_year: String,
    pub license_type: String,
    pub description: String,
    /// Ids this package depends on (declared).
    pub required_packages: Vec<String>,
    /// Ids that depend on this package (derived by the categorizer).
    pub required_by: Vec<String>,
    /// Relative forward-slash paths rooted at the TEXMF prefix.
    pub run_files: Vec<String>,
    pub doc_files: Vec<String>,
    pub source_files: Vec<String>,
    pub size_run_files: u64,
    pub size_doc_files: u64,
    pub size_source_files: u64,
    /// TDS digest: the identity of the package's content.
    pub digest: Option<Digest>,
    /// Seconds since the epoch; carried forward when content is unchanged.
    pub time_packaged: Option<i64>,
    pub archive_file_size: u64,
    pub archive_file_digest: Option<Digest>,
    /// The staging directory this package was read from.
    pub path: PathBuf,
}

impl PackageInfo {
    pub fn num_files(&self) -> usize {
        self.run_files.len() + self.doc_files.len() + self.source_files.len()
    }

    /// A pure container carries no content of its own: either no files at
    /// all, or a single run file that is its own package manifest. Pure
    /// containers get no archive.
    pub fn is_pure_container(&self) -> bool {
        if !self.doc_files.is_empty() || !self.source_files.is_empty() {
            return false;
        }
        match self.run_files.as_slice() {
            [] => true,
            [only] => only.to_ascii_lowercase().ends_with(".tpm"),
            _ => false,
        }
    }
}

/// Distribution level of a package. `S`, `M`, `L` and `T` ("total") define
/// successively larger sets; `-` omits the package from the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageLevel {
    Small,
    Medium,
    Large,
    Total,
    Ignore,
}

impl PackageLevel {
    pub fn as_char(&self) -> char {
        match self {
            PackageLevel::Small => 'S',
            PackageLevel::Medium => 'M',
            PackageLevel::Large => 'L',
            PackageLevel::Total => 'T',
            PackageLevel::Ignore => '-',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'S' => Some(PackageLevel::Small),
            'M' => Some(PackageLevel::Medium),
            'L' => Some(PackageLevel::Large),
            'T' => Some(PackageLevel::Total),
            '-' => Some(PackageLevel::Ignore),
            _ => None,
        }
    }
}

impl fmt::Display for PackageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for PackageLevel {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => PackageLevel::from_char(c)
                .ok_or_else(|| crate::Error::config(format!("invalid package level: {}", s))),
            _ => Err(crate::Error::config(format!("invalid package level: {}", s))),
        }
    }
}

/// One line of the package-list file.
#[derive(Debug, Clone)]
pub struct PackageSpec {
    pub id: String,
    pub level: PackageLevel,
    pub archive_file_type: ArchiveFileType,
}

/// Package table keyed by id with case-insensitive lookup. Iteration is in
/// folded-id order, which for separator-free ids coincides with the DOS
/// ordering used elsewhere.
#[derive(Debug, Clone, Default)]
pub struct PackageTable {
    packages: BTreeMap<String, PackageInfo>,
}

fn table_key(id: &str) -> String {
    id.to_ascii_lowercase()
}

impl PackageTable {
    pub fn new() -> Self {
        PackageTable {
            packages: BTreeMap::new(),
        }
    }

    /// Insert a package, replacing any previous entry for the same id.
    pub fn insert(&mut self, info: PackageInfo) {
        self.packages.insert(table_key(&info.id), info);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.packages.contains_key(&table_key(id))
    }

    pub fn get(&self, id: &str) -> Option<&PackageInfo> {
        self.packages.get(&table_key(id))
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut PackageInfo> {
        self.packages.get_mut(&table_key(id))
    }

    pub fn values(&self) -> btree_map::Values<'_, String, PackageInfo> {
        self.packages.values()
    }

    pub fn values_mut(&mut self) -> btree_map::ValuesMut<'_, String, PackageInfo> {
        self.packages.values_mut()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_round_trip() {
        for c in ['S', 'M', 'L', 'T', '-'] {
            let level = PackageLevel::from_char(c).unwrap();
            assert_eq!(level.as_char(), c);
            assert_eq!(c.to_string().parse::<PackageLevel>().unwrap(), level);
        }
        assert!(PackageLevel::from_char('x').is_none());
        assert!("ST".parse::<PackageLevel>().is_err());
        assert!("".parse::<PackageLevel>().is_err());
    }

    #[test]
    fn test_pure_container() {
        let mut info = PackageInfo::default();
        assert!(info.is_pure_container());

        info.run_files = vec!["texmf/tpm/packages/foo.tpm".to_string()];
        assert!(info.is_pure_container());

        info.run_files = vec!["texmf/tex/latex/foo/foo.sty".to_string()];
        assert!(!info.is_pure_container());

        info.run_files = vec!["texmf/tpm/packages/foo.tpm".to_string()];
        info.doc_files = vec!["texmf/doc/foo.pdf".to_string()];
        assert!(!info.is_pure_container());
    }

    #[test]
    fn test_table_lookup_is_case_insensitive() {
        let mut table = PackageTable::new();
        table.insert(PackageInfo {
            id: "Foo".to_string(),
            ..PackageInfo::default()
        });
        assert!(table.contains("foo"));
        assert!(table.contains("FOO"));
        assert_eq!(table.get("foo").unwrap().id, "Foo");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_table_iterates_in_folded_order() {
        let mut table = PackageTable::new();
        for id in ["zeta", "Alpha", "beta"] {
            table.insert(PackageInfo {
                id: id.to_string(),
                ..PackageInfo::default()
            });
        }
        let ids: Vec<&str> = table.values().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["Alpha", "beta", "zeta"]);
    }
}
