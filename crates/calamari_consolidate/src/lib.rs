#![deny(missing_docs)]

//! Consolidates the platform specific Calamari packages into a single
//! deduplicated zip archive.
//!
//! Each input package is a zip archive (a `.nupkg`, or a directory of tool zips
//! for `Sashimi.*` packages). Many files occur verbatim in several of them, so
//! every file is stored exactly once under `{hash}/{path}` in the output, and an
//! `index.json` entry records which hashes make up every package, version and
//! platform.
//!
//! The output is named after a fingerprint of the input packages and the
//! version of this crate. When a package with the same name already exists in
//! the output directory it is reused as is.
//!
//! ```no_run
//! use calamari_consolidate::{ConsolidateConfig, Consolidator, PackageReference};
//! use std::path::Path;
//!
//! let references = vec![
//!     PackageReference::new("Calamari", "12.0.2", "/packages/calamari/12.0.2"),
//!     PackageReference::new("Calamari.linux-x64", "12.0.2", "/packages/calamari.linux-x64/12.0.2"),
//! ];
//! let outcome = Consolidator::new(ConsolidateConfig::default())
//!     .execute(Path::new("out"), &references)
//!     .unwrap();
//! println!("{:?}", outcome.output_path());
//! ```

mod consolidate;
mod dedup;
pub mod fingerprint;
pub mod index;
mod package;
pub mod source;
pub mod writer;

use std::path::PathBuf;

pub use consolidate::{
    ConsolidateConfig, ConsolidatedPackage, ConsolidationOutcome, Consolidator,
};
pub use dedup::EntryConflict;
pub use index::{ConsolidatedIndex, IndexPackage, INDEX_ENTRY_NAME};
pub use package::{PackageReference, SourceFileDescriptor};
pub use writer::CompressionLevel;

/// An error that aborts a consolidation run.
#[derive(thiserror::Error, Debug)]
#[allow(missing_docs)]
pub enum ConsolidateError {
    #[error("could not find the source NuGet package {0}")]
    MissingPackageArchive(PathBuf),

    #[error("the package name '{0}' does not contain a platform")]
    InvalidPackageName(String),

    #[error("failed to read the archive {0}")]
    ReadArchive(PathBuf, #[source] zip::result::ZipError),

    #[error("failed to write the consolidated package")]
    WriteArchive(#[source] zip::result::ZipError),

    #[error("the content of '{entry}' in {archive} changed while consolidating")]
    ContentChanged { archive: PathBuf, entry: String },

    #[error("failed to serialize the package index")]
    SerializeIndex(#[source] serde_json::Error),

    #[error("an io error occurred")]
    IoError(#[from] std::io::Error),
}
