// src/error.rs

//! Error taxonomy for the package creator
//!
//! Every failure is fatal at the point of detection: the binary prints a
//! single `mpc: <message>` line to stderr and exits 1. Duplicate packages
//! are the one exception; they are reported as warnings and the first
//! occurrence wins.

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad invocation or environment: missing required argument,
    /// unsupported package series, unusable signing key.
    #[error("{0}")]
    Configuration(String),

    /// A package.ini, package manifest or package list file is not usable.
    #[error("invalid package information file ({0})")]
    InvalidManifest(String),

    /// The recomputed TDS digest does not match the recorded one.
    #[error("bad TDS digest ({id})")]
    DigestMismatch { id: String },

    /// A child process failed to spawn or exited non-zero. The combined
    /// stdout/stderr of the process is attached.
    #[error("{command} failed:\n{output}")]
    ExternalTool { command: String, output: String },

    /// An archive could not be created or read.
    #[error("archive error: {0}")]
    Archive(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Shorthand for a [`Error::Configuration`] with a message.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }
}
