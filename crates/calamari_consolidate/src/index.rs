//! The `index.json` manifest embedded in every consolidated package.
//!
//! The manifest lists, for every package, version and platform, the hashes of
//! the files that make it up. A file is found in the package at
//! `{hash}/{path}`.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use calamari_digest::ContentHash;
use serde::{Deserialize, Serialize};

use crate::SourceFileDescriptor;

/// The name of the manifest entry inside a consolidated package.
pub const INDEX_ENTRY_NAME: &str = "index.json";

/// The files of one package, version and platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IndexPackage {
    /// The logical package.
    pub package_id: String,
    /// The package version.
    pub version: String,
    /// The platform the files target.
    pub platform: String,
    /// The hashes of the files, ascending and without duplicates.
    pub hashes: Vec<ContentHash>,
}

/// Groups files by package, version and platform. The result is ordered by
/// that key.
pub fn build_index(files: &[SourceFileDescriptor]) -> Vec<IndexPackage> {
    let mut groups: BTreeMap<(&str, &str, &str), BTreeSet<ContentHash>> = BTreeMap::new();
    for file in files {
        groups
            .entry((
                file.package_id.as_str(),
                file.version.as_str(),
                file.platform.as_str(),
            ))
            .or_default()
            .insert(file.content_hash);
    }

    groups
        .into_iter()
        .map(|((package_id, version, platform), hashes)| IndexPackage {
            package_id: package_id.to_owned(),
            version: version.to_owned(),
            platform: platform.to_owned(),
            hashes: hashes.into_iter().collect(),
        })
        .collect()
}

/// Writes the index as indented JSON.
pub fn write_index(writer: impl Write, packages: &[IndexPackage]) -> serde_json::Result<()> {
    serde_json::to_writer_pretty(writer, packages)
}

/// An error that can occur when reading an index.
#[derive(thiserror::Error, Debug)]
#[allow(missing_docs)]
pub enum IndexError {
    #[error("failed to open the consolidated package {0}")]
    Archive(PathBuf, #[source] zip::result::ZipError),

    #[error("the consolidated package {0} does not contain an index")]
    MissingIndex(PathBuf),

    #[error("the index is not valid")]
    InvalidIndex(#[from] serde_json::Error),

    #[error("an io error occurred")]
    IoError(#[from] std::io::Error),
}

type IndexKey = (String, String, String);

fn index_key(package_id: &str, version: &str, platform: &str) -> IndexKey {
    (
        package_id.to_lowercase(),
        version.to_lowercase(),
        platform.to_lowercase(),
    )
}

/// The index of a consolidated package, read back from disk.
///
/// Lookups ignore the case of the package, version and platform. Entries that
/// only differ in case are merged.
#[derive(Debug, Clone, Default)]
pub struct ConsolidatedIndex {
    packages: BTreeMap<IndexKey, IndexPackage>,
}

impl ConsolidatedIndex {
    /// Reads the index from the JSON representation.
    pub fn from_reader(reader: impl Read) -> Result<Self, IndexError> {
        let packages: Vec<IndexPackage> = serde_json::from_reader(reader)?;
        Ok(packages.into_iter().collect())
    }

    /// Reads the index embedded in a consolidated package.
    pub fn from_archive(path: &Path) -> Result<Self, IndexError> {
        let file = fs_err::File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| IndexError::Archive(path.to_path_buf(), e))?;
        let entry = match archive.by_name(INDEX_ENTRY_NAME) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(IndexError::MissingIndex(path.to_path_buf()))
            }
            Err(e) => return Err(IndexError::Archive(path.to_path_buf(), e)),
        };
        Self::from_reader(entry)
    }

    /// Returns the hashes of the files of a package, version and platform.
    pub fn hashes(
        &self,
        package_id: &str,
        version: &str,
        platform: &str,
    ) -> Option<&[ContentHash]> {
        self.packages
            .get(&index_key(package_id, version, platform))
            .map(|package| package.hashes.as_slice())
    }

    /// Iterates over all packages in the index.
    pub fn packages(&self) -> impl Iterator<Item = &IndexPackage> + '_ {
        self.packages.values()
    }

    /// Returns the number of package, version and platform combinations.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Returns true if the index does not contain any packages.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl FromIterator<IndexPackage> for ConsolidatedIndex {
    fn from_iter<T: IntoIterator<Item = IndexPackage>>(iter: T) -> Self {
        let mut packages: BTreeMap<IndexKey, IndexPackage> = BTreeMap::new();
        for package in iter {
            let key = index_key(&package.package_id, &package.version, &package.platform);
            match packages.get_mut(&key) {
                Some(existing) => {
                    existing.hashes.extend(package.hashes);
                    existing.hashes.sort();
                    existing.hashes.dedup();
                }
                None => {
                    packages.insert(key, package);
                }
            }
        }
        Self { packages }
    }
}
