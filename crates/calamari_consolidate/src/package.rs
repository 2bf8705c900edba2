//! The records that flow through a consolidation run.

use std::path::PathBuf;

use calamari_digest::ContentHash;
use serde::Deserialize;

/// A package that was already resolved to a directory on disk by the build
/// host.
///
/// Deserializes from the metadata names the build host uses (`Name`,
/// `Version`, `ResolvedPath`) as well as from their snake case equivalents.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PackageReference {
    /// The name of the package, e.g. `Calamari.linux-x64`.
    #[serde(rename = "Name", alias = "name")]
    pub name: String,

    /// The version of the package.
    #[serde(rename = "Version", alias = "version")]
    pub version: String,

    /// The directory the package was extracted to.
    #[serde(rename = "ResolvedPath", alias = "resolved_path")]
    pub resolved_path: PathBuf,
}

impl PackageReference {
    /// Constructs a new reference.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        resolved_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            resolved_path: resolved_path.into(),
        }
    }
}

/// A single file extracted from a source archive together with the logical
/// package it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFileDescriptor {
    /// The logical package, which is not necessarily the name of the package
    /// reference the file was read from.
    pub package_id: String,

    /// The version of the package reference the file was read from.
    pub version: String,

    /// The platform the file targets, e.g. `netfx` or `linux-x64`.
    pub platform: String,

    /// The archive the bytes of this file live in.
    pub source_archive_path: PathBuf,

    /// The name of the entry inside [`Self::source_archive_path`].
    pub source_entry_name: String,

    /// The path of the file inside the consolidated package, without the hash
    /// prefix.
    pub destination_entry_name: String,

    /// The hash of the decompressed bytes of the entry.
    pub content_hash: ContentHash,
}

impl SourceFileDescriptor {
    /// The content addressed path under which this file is stored in the
    /// consolidated package.
    pub fn consolidated_entry_name(&self) -> String {
        format!("{}/{}", self.content_hash, self.destination_entry_name)
    }
}
