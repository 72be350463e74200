// src/series.rs

//! Package series numbers
//!
//! A series is the `MAJOR.MINOR` pair that names a repository generation.
//! Database archive files carry it in their names; the archive format for
//! those files switched from bzip2 to lzma in series 2.7.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// The newest series this build can produce.
pub const SUPPORTED_SERIES: Series = Series { major: 2, minor: 9 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Series {
    pub major: u32,
    pub minor: u32,
}

impl Series {
    pub const fn new(major: u32, minor: u32) -> Self {
        Series { major, minor }
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Series {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| Error::config(format!("invalid series number: {}", s)))?;
        let major = major
            .parse()
            .map_err(|_| Error::config(format!("invalid series number: {}", s)))?;
        let minor = minor
            .parse()
            .map_err(|_| Error::config(format!("invalid series number: {}", s)))?;
        Ok(Series { major, minor })
    }
}
