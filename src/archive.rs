// src/archive.rs

//! Archive creation and extraction
//!
//! Package archives are plain tarballs compressed with raw LZMA (the
//! `.tar.lzma` format that `xz --format=lzma` produces) or bzip2. Both are
//! handled in-process; only the legacy `.cab` read path shells out to
//! `cabextract`. Tar entries are appended in sorted order so archive
//! contents are reproducible for unchanged input.

use crate::error::{Error, Result};
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;
use walkdir::WalkDir;
use xz2::read::XzDecoder;
use xz2::stream::{LzmaOptions, Stream};
use xz2::write::XzEncoder;

const LZMA_PRESET: u32 = 6;

/// Supported archive file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFileType {
    /// Microsoft cabinet; read-only legacy format.
    MSCab,
    TarBzip2,
    TarLzma,
    Tar,
    Zip,
}

impl ArchiveFileType {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFileType::MSCab => ".cab",
            ArchiveFileType::TarBzip2 => ".tar.bz2",
            ArchiveFileType::TarLzma => ".tar.lzma",
            ArchiveFileType::Tar => ".tar",
            ArchiveFileType::Zip => ".zip",
        }
    }

    /// The `Type` value recorded in the repository manifest.
    pub fn type_name(&self) -> &'static str {
        match self {
            ArchiveFileType::MSCab => "MSCab",
            ArchiveFileType::TarBzip2 => "TarBzip2",
            ArchiveFileType::TarLzma => "TarLzma",
            _ => "unknown",
        }
    }
}

fn new_lzma_encoder(file: File) -> Result<XzEncoder<File>> {
    let options = LzmaOptions::new_preset(LZMA_PRESET)
        .map_err(|e| Error::Archive(format!("lzma options: {}", e)))?;
    let stream = Stream::new_lzma_encoder(&options)
        .map_err(|e| Error::Archive(format!("lzma encoder: {}", e)))?;
    Ok(XzEncoder::new_stream(file, stream))
}

fn new_lzma_decoder(file: File) -> Result<XzDecoder<File>> {
    let stream = Stream::new_lzma_decoder(u64::MAX)
        .map_err(|e| Error::Archive(format!("lzma decoder: {}", e)))?;
    Ok(XzDecoder::new_stream(file, stream))
}

/// Append `base_dir/name` (a file or a directory tree) to a tar builder
/// under the entry name `name`. Directory contents are appended in sorted
/// order.
fn append_entry<W: Write>(builder: &mut tar::Builder<W>, base_dir: &Path, name: &str) -> Result<()> {
    let root = base_dir.join(name);
    if root.is_file() {
        builder.append_path_with_name(&root, name)?;
        return Ok(());
    }
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        let rel = entry
            .path()
            .strip_prefix(base_dir)
            .map_err(|e| Error::Archive(e.to_string()))?;
        if entry.file_type().is_dir() {
            builder.append_dir(rel, entry.path())?;
        } else {
            builder.append_path_with_name(entry.path(), rel)?;
        }
    }
    Ok(())
}

/// Create a compressed archive at `out_file` holding `base_dir/name` under
/// the entry name `name`. An empty archive is produced when the entry does
/// not exist. The intermediate tar lives in a scoped temp file next to the
/// output and is removed on all paths.
pub fn create_archive(
    base_dir: &Path,
    name: &str,
    out_file: &Path,
    file_type: ArchiveFileType,
) -> Result<()> {
    let out_dir = out_file.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(out_dir)?;
    let tar_file = tempfile::Builder::new()
        .prefix("mpc-tar")
        .tempfile_in(out_dir)?;

    {
        let mut builder = tar::Builder::new(tar_file.as_file());
        if base_dir.join(name).exists() {
            append_entry(&mut builder, base_dir, name)?;
        }
        builder.finish()?;
    }

    if out_file.exists() {
        fs::remove_file(out_file)?;
    }
    debug!("creating {}", out_file.display());
    let mut tar = File::open(tar_file.path())?;
    match file_type {
        ArchiveFileType::TarLzma => {
            let mut encoder = new_lzma_encoder(File::create(out_file)?)?;
            io::copy(&mut tar, &mut encoder)?;
            encoder.finish()?;
        }
        ArchiveFileType::TarBzip2 => {
            let mut encoder = BzEncoder::new(File::create(out_file)?, bzip2::Compression::default());
            io::copy(&mut tar, &mut encoder)?;
            encoder.finish()?;
        }
        ArchiveFileType::Tar => {
            io::copy(&mut tar, &mut File::create(out_file)?)?;
        }
        _ => {
            return Err(Error::Archive(format!(
                "unsupported archive file type: {:?}",
                file_type
            )))
        }
    }
    Ok(())
}

/// Compress a single file. The uncompressed original is left in place.
pub fn compress_file(src: &Path, file_type: ArchiveFileType, out_file: &Path) -> Result<()> {
    if out_file.exists() {
        fs::remove_file(out_file)?;
    }
    let mut from = File::open(src)?;
    match file_type {
        ArchiveFileType::TarLzma => {
            let mut encoder = new_lzma_encoder(File::create(out_file)?)?;
            io::copy(&mut from, &mut encoder)?;
            encoder.finish()?;
        }
        ArchiveFileType::TarBzip2 => {
            let mut encoder = BzEncoder::new(File::create(out_file)?, bzip2::Compression::default());
            io::copy(&mut from, &mut encoder)?;
            encoder.finish()?;
        }
        _ => {
            return Err(Error::Archive(format!(
                "unsupported compression type: {:?}",
                file_type
            )))
        }
    }
    Ok(())
}

/// Decompress a single `.lzma` or `.bz2` file.
pub fn decompress_file(src: &Path, file_type: ArchiveFileType, out_file: &Path) -> Result<()> {
    let from = File::open(src)?;
    let mut reader: Box<dyn Read> = match file_type {
        ArchiveFileType::TarLzma => Box::new(new_lzma_decoder(from)?),
        ArchiveFileType::TarBzip2 => Box::new(BzDecoder::new(from)),
        _ => {
            return Err(Error::Archive(format!(
                "unsupported compression type: {:?}",
                file_type
            )))
        }
    };
    io::copy(&mut reader, &mut File::create(out_file)?)?;
    Ok(())
}

fn open_tar(archive_file: &Path, file_type: ArchiveFileType) -> Result<tar::Archive<Box<dyn Read>>> {
    let file = File::open(archive_file)?;
    let reader: Box<dyn Read> = match file_type {
        ArchiveFileType::TarLzma => Box::new(new_lzma_decoder(file)?),
        ArchiveFileType::TarBzip2 => Box::new(BzDecoder::new(file)),
        ArchiveFileType::Tar => Box::new(file),
        _ => {
            return Err(Error::Archive(format!(
                "unsupported archive file type: {:?}",
                file_type
            )))
        }
    };
    Ok(tar::Archive::new(reader))
}

/// Unpack an archive into `out_dir`.
pub fn extract_all(archive_file: &Path, file_type: ArchiveFileType, out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)?;
    match file_type {
        ArchiveFileType::MSCab => {
            run_captured(
                Command::new("cabextract")
                    .arg(archive_file)
                    .current_dir(out_dir),
            )?;
            Ok(())
        }
        _ => {
            let mut archive = open_tar(archive_file, file_type)?;
            archive.unpack(out_dir)?;
            Ok(())
        }
    }
}

/// Extract a single named entry to `out_file`.
pub fn extract_single(
    archive_file: &Path,
    file_type: ArchiveFileType,
    entry_name: &str,
    out_file: &Path,
) -> Result<()> {
    match file_type {
        ArchiveFileType::MSCab => {
            let output = run_captured(
                Command::new("cabextract")
                    .arg("--filter")
                    .arg(entry_name)
                    .arg("--pipe")
                    .arg(archive_file),
            )?;
            fs::write(out_file, output)?;
            Ok(())
        }
        _ => {
            let mut archive = open_tar(archive_file, file_type)?;
            for entry in archive.entries()? {
                let mut entry = entry?;
                let path = entry.path()?;
                let path = path.to_string_lossy().replace('\\', "/");
                if path.trim_start_matches("./") == entry_name {
                    let mut to = File::create(out_file)?;
                    io::copy(&mut entry, &mut to)?;
                    return Ok(());
                }
            }
            Err(Error::Archive(format!(
                "{}: no entry {}",
                archive_file.display(),
                entry_name
            )))
        }
    }
}

/// Look for an existing package archive `<repo>/<id><ext>`. Formats are
/// probed in cab, bz2, lzma order with the last match winning, so newer
/// formats are preferred.
pub fn find_package_archive(repository: &Path, id: &str) -> Option<(PathBuf, ArchiveFileType)> {
    let mut found = None;
    for file_type in [
        ArchiveFileType::MSCab,
        ArchiveFileType::TarBzip2,
        ArchiveFileType::TarLzma,
    ] {
        let candidate = repository.join(format!("{}{}", id, file_type.extension()));
        if candidate.is_file() {
            found = Some((candidate, file_type));
        }
    }
    found
}

/// Run a child process, capturing combined stdout/stderr. Spawn failure or
/// non-zero exit is fatal with the captured output attached.
fn run_captured(command: &mut Command) -> Result<Vec<u8>> {
    let command_display = format!("{:?}", command);
    debug!("running: {}", command_display);
    let output = command.output().map_err(|e| Error::ExternalTool {
        command: command_display.clone(),
        output: e.to_string(),
    })?;
    if !output.status.success() {
        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);
        return Err(Error::ExternalTool {
            command: command_display,
            output: String::from_utf8_lossy(&combined).into_owned(),
        });
    }
    Ok(output.stdout)
}
