// src/repository/mod.rs

//! The repository assembly pipeline
//!
//! Previous state is loaded by [`reader`], dependency edges and umbrella
//! membership are derived by [`categorize`], per-package archives are
//! reused or rebuilt by [`reconciler`], and the four database artifacts are
//! published by [`writer`].

pub mod categorize;
pub mod reader;
pub mod reconciler;
pub mod writer;

pub use categorize::categorize;
pub use reader::{load_package_manifests, load_repository_manifest};
pub use reconciler::update_repository;
pub use writer::write_database;
