// src/list.rs

//! Package list files
//!
//! Line-oriented: the first character is the distribution level (`S`, `M`,
//! `L`, `T`, or `-` for "omit"), followed by the package id and an optional
//! archive type, separated by `;`. A line starting with `@` includes
//! another list file. Unrecognized lines are skipped; duplicate ids warn
//! and the first marking wins.

use crate::archive::ArchiveFileType;
use crate::error::{Error, Result};
use crate::options::BuildOptions;
use crate::package::{PackageLevel, PackageSpec};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Read a package list file (and any `@`-included files) into the map.
pub fn read_package_list(
    path: &Path,
    list: &mut BTreeMap<String, PackageSpec>,
    options: &BuildOptions,
) -> Result<()> {
    let text = fs::read_to_string(path)?;
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let marker = line.chars().next().unwrap();
        let rest = line[marker.len_utf8()..].trim_start_matches([' ', '\t']);
        if rest.is_empty() {
            continue;
        }
        if marker == '@' {
            read_package_list(Path::new(rest), list, options)?;
            continue;
        }
        let level = match PackageLevel::from_char(marker) {
            Some(level) => level,
            None => continue,
        };

        let mut tokens = rest.split(';');
        let id = tokens.next().unwrap_or_default().to_string();
        if let Some(existing) = list.get(&id) {
            warn!(
                "ignoring '{} {}': already marked as '{}'",
                marker, id, existing.level
            );
            continue;
        }
        let archive_file_type = match tokens.next() {
            None | Some("") => options.default_archive_file_type,
            Some("MSCab") => ArchiveFileType::MSCab,
            Some("TarBzip2") => ArchiveFileType::TarBzip2,
            Some("TarLzma") => ArchiveFileType::TarLzma,
            Some(_) => {
                return Err(Error::InvalidManifest(format!(
                    "invalid package list file: {}",
                    path.display()
                )))
            }
        };
        list.insert(
            id.clone(),
            PackageSpec {
                id,
                level,
                archive_file_type,
            },
        );
    }
    Ok(())
}
