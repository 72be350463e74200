// src/main.rs
//! MiKTeX Package Creator - CLI Entry Point

use clap::Parser;
use mpc::{
    list, repository, staging, tds, BuildOptions, Error, KeyFileProvider, PackageTable, Result,
    Signer, SUPPORTED_SERIES,
};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

// =============================================================================
// CLI Definitions
// =============================================================================

#[derive(Parser)]
#[command(name = "mpc")]
#[command(version)]
#[command(about = "MiKTeX Package Creator", long_about = None)]
struct Cli {
    /// Create a TDS hierarchy
    #[arg(long, group = "mode")]
    build_tds: bool,

    /// Create a package archive file and update the database
    #[arg(long, group = "mode")]
    create_package: bool,

    /// Create a staging directory from a package manifest
    #[arg(long, group = "mode")]
    disassemble_package: bool,

    /// Update the package repository
    #[arg(long, group = "mode")]
    update_repository: bool,

    /// Turn on verbose mode
    #[arg(long)]
    verbose: bool,

    /// Default package level (one of: S, M, L, T, -)
    #[arg(long, value_name = "LEVEL")]
    default_level: Option<String>,

    /// The MiKTeX major/minor version
    #[arg(long = "miktex-series", value_name = "MAJOR.MINOR")]
    miktex_series: Option<String>,

    /// The package list file
    #[arg(long, value_name = "FILE")]
    package_list: Option<PathBuf>,

    /// The file containing the passphrase for the private key
    #[arg(long, value_name = "FILE")]
    passphrase_file: Option<PathBuf>,

    /// The private key file used for signing
    #[arg(long, value_name = "FILE")]
    private_key_file: Option<PathBuf>,

    /// The release state (one of: stable, next)
    #[arg(long, value_name = "STATE")]
    release_state: Option<String>,

    /// The location of the local package repository
    #[arg(long, value_name = "DIR")]
    repository: Option<PathBuf>,

    /// The staging directory
    #[arg(long, value_name = "DIR")]
    staging_dir: Option<PathBuf>,

    /// The staging root directories, joined by the platform path separator
    #[arg(long, value_name = "DIRS")]
    staging_roots: Option<String>,

    /// The TEXMF parent directory
    #[arg(long, value_name = "DIR")]
    texmf_parent: Option<PathBuf>,

    /// The TEXMF prefix
    #[arg(long, value_name = "PREFIX", default_value = "texmf")]
    texmf_prefix: String,

    /// The package time-stamp (in seconds since 1970)
    #[arg(long, value_name = "TIME")]
    time_packaged: Option<i64>,

    /// The destination directory for package manifest files
    #[arg(long, value_name = "DIR")]
    tpm_dir: Option<PathBuf>,

    /// The name of a package manifest file
    #[arg(long, value_name = "FILE")]
    tpm_file: Option<PathBuf>,
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(if cli.verbose { "debug" } else { "info" })
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("mpc: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn build_options(cli: &Cli) -> Result<BuildOptions> {
    let mut options = BuildOptions::new();

    options.texmf_prefix = cli.texmf_prefix.clone();

    if let Some(level) = &cli.default_level {
        if level.is_empty() {
            return Err(Error::config("Missing package level."));
        }
        options.default_level = level.parse()?;
    }

    if let Some(series) = &cli.miktex_series {
        let series = series.parse()?;
        if series > SUPPORTED_SERIES {
            return Err(Error::config("Unsupported MiKTeX major/minor version."));
        }
        options.series = series;
    }

    if let Some(state) = &cli.release_state {
        options.release_state = state.clone();
    }

    if let Some(time) = cli.time_packaged {
        options.time_packaged = time;
    }

    if let Some(path) = &cli.package_list {
        let mut package_list = std::mem::take(&mut options.package_list);
        list::read_package_list(path, &mut package_list, &options)?;
        options.package_list = package_list;
    }

    if let Some(key_file) = &cli.private_key_file {
        let passphrase = match &cli.passphrase_file {
            Some(path) => Some(
                std::fs::read_to_string(path)?
                    .trim_end_matches(['\r', '\n'])
                    .to_string(),
            ),
            None => None,
        };
        let provider = KeyFileProvider::new(key_file.clone(), passphrase);
        options.signer = Some(Signer::from_provider(&provider)?);
    }

    Ok(options)
}

fn collect_staging_roots(cli: &Cli, options: &BuildOptions) -> Result<PackageTable> {
    let roots = cli
        .staging_roots
        .as_deref()
        .ok_or_else(|| Error::config("No staging roots were specified."))?;

    let mut table = PackageTable::new();
    for root in env::split_paths(roots) {
        staging::collect_packages(&root, &mut table, options)?;
    }
    if table.is_empty() {
        return Err(Error::config("No staging directories were found."));
    }
    Ok(table)
}

fn run(cli: Cli) -> Result<()> {
    let options = build_options(&cli)?;

    if cli.create_package {
        let staging_dir = match &cli.staging_dir {
            Some(dir) => dir.clone(),
            None => env::current_dir()?,
        };
        let repo = cli
            .repository
            .as_deref()
            .ok_or_else(|| Error::config("No repository location was specified."))?;

        info!("Loading repository manifest from {}...", repo.display());
        let mut manifest = repository::load_repository_manifest(repo, &options)?;
        let mut table = repository::load_package_manifests(repo, &options)?;

        info!("Reading staging directory {}...", staging_dir.display());
        let mut info = staging::read_package_info(&staging_dir)?;
        staging::collect_package(&mut info, &options.texmf_prefix)?;
        table.insert(info);

        repository::update_repository(&mut table, repo, &mut manifest, &options)?;
        info!("Writing database to {}...", repo.display());
        repository::write_database(&table, repo, false, &mut manifest, &options)?;
    } else if cli.disassemble_package {
        let tpm_file = cli
            .tpm_file
            .as_deref()
            .ok_or_else(|| Error::config("No package manifest file has been specified."))?;
        let texmf_parent = cli
            .texmf_parent
            .as_deref()
            .ok_or_else(|| Error::config("No TEXMF parent directory has been specified."))?;
        let staging_dir = cli
            .staging_dir
            .as_deref()
            .ok_or_else(|| Error::config("No staging directory has been specified."))?;
        mpc::disassemble::disassemble_package(tpm_file, texmf_parent, staging_dir, &options)?;
    } else if cli.build_tds {
        let table = collect_staging_roots(&cli, &options)?;
        let texmf_parent = cli
            .texmf_parent
            .as_deref()
            .ok_or_else(|| Error::config("No TEXMF parent directory has been specified."))?;

        let mut manifest = mpc::cfg::Document::new();
        tds::build_tds(&table, texmf_parent, &mut manifest, &options)?;
        if let Some(tpm_dir) = &cli.tpm_dir {
            tds::write_package_manifest_files(&table, tpm_dir, &manifest, &options)?;
        }
        tds::write_mpm_ini(texmf_parent, &manifest, &options)?;
    } else if cli.update_repository {
        let mut table = collect_staging_roots(&cli, &options)?;
        let repo = cli
            .repository
            .as_deref()
            .ok_or_else(|| Error::config("No repository location was specified."))?;

        let mut manifest = repository::load_repository_manifest(repo, &options)?;
        repository::categorize(&mut table);
        repository::update_repository(&mut table, repo, &mut manifest, &options)?;
        repository::write_database(&table, repo, true, &mut manifest, &options)?;
    } else {
        return Err(Error::config("No task was specified."));
    }

    Ok(())
}
